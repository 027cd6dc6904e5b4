use tablelink_core::{DeviceId, RoomId};
use tablelink_session::{SessionError, SignalingTransport};

use crate::integration::init_tracing;
use crate::integration::relay_tests::{ROOM, spawn_stub_relay};

#[tokio::test]
async fn test_create_and_join_room() {
    init_tracing();

    let (relay, _state) = spawn_stub_relay().await;

    let room = relay.create_room(&DeviceId::from("host")).await.unwrap();
    assert_eq!(room.room_id.as_str(), ROOM);
    assert_eq!(room.host_token, "host-token-host");
    assert!(room.created_at > 0);

    let joined = relay
        .join_room(&room.room_id, &DeviceId::from("guest-1"))
        .await
        .unwrap();
    assert_eq!(joined.host_id, DeviceId::from("host"));
    assert_eq!(joined.token, "guest-token-guest-1");

    let missing = RoomId::from("000000");
    assert_eq!(
        relay.join_room(&missing, &DeviceId::from("guest-1")).await,
        Err(SessionError::InviteNotFound(missing))
    );
}
