use tablelink_core::{ApplicationMessage, DeviceId};
use tablelink_session::{LinkState, SessionRole, SessionStatus};

use crate::integration::orchestrator_tests::OrchestratorHarness;
use crate::integration::{hello, init_tracing, test_config};
use crate::utils::{Recorded, RecordingCallbacks, WAIT};

#[tokio::test(start_paused = true)]
async fn test_session_state_reports_peers() {
    init_tracing();

    let mut harness = OrchestratorHarness::new("host", test_config());
    let callbacks = RecordingCallbacks::new();
    let room = harness
        .orchestrator
        .start_host_session(callbacks.clone())
        .await
        .unwrap();
    let alice = DeviceId::from("alice");
    let peer = harness.admit(&room.room_id, &alice, &callbacks).await;

    peer.deliver(&ApplicationMessage::hello(hello("Alice")));
    assert!(
        callbacks
            .wait_for(1, WAIT, |r| matches!(r, Recorded::Message { message, .. } if message.kind() == "hello"))
            .await
    );

    let state = harness.orchestrator.session_state().await.unwrap();
    assert_eq!(state.role, SessionRole::Host);
    assert_eq!(state.status, SessionStatus::Connected);
    assert_eq!(state.room_id, room.room_id);
    assert_eq!(state.host_id, None);

    let summary = &state.peers[&alice];
    assert_eq!(summary.device_id, alice);
    assert_eq!(summary.link_state, LinkState::Connected);
    assert_eq!(summary.info, Some(hello("Alice")));
}
