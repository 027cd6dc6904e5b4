use tablelink_core::{DeviceId, RoomId};
use tablelink_session::SignalingTransport;

use crate::integration::init_tracing;
use crate::integration::relay_tests::{ROOM, spawn_stub_relay};

#[tokio::test]
async fn test_participants_exclude_caller() {
    init_tracing();

    let (relay, _state) = spawn_stub_relay().await;
    let room = RoomId::from(ROOM);

    let seen_by_host = relay
        .list_participants(&room, &DeviceId::from("host"))
        .await
        .unwrap();
    assert_eq!(
        seen_by_host,
        vec![DeviceId::from("guest-1"), DeviceId::from("guest-2")]
    );

    let seen_by_guest = relay
        .list_participants(&room, &DeviceId::from("guest-2"))
        .await
        .unwrap();
    assert_eq!(
        seen_by_guest,
        vec![DeviceId::from("host"), DeviceId::from("guest-1")]
    );
}
