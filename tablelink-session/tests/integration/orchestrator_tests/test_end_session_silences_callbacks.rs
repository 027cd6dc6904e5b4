use std::time::Duration;
use tablelink_core::{ApplicationMessage, DeviceId};
use tablelink_session::{SessionStatus, TransportEvent};

use crate::integration::orchestrator_tests::OrchestratorHarness;
use crate::integration::{init_tracing, test_config};
use crate::utils::RecordingCallbacks;

#[tokio::test(start_paused = true)]
async fn test_end_session_silences_callbacks() {
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

    harness.orchestrator.end_session().await;

    assert!(!harness.orchestrator.is_active().await);
    assert!(harness.relay.is_closed(&room.room_id).await);
    assert!(peer.is_closed());
    assert_eq!(
        callbacks.statuses().await.last(),
        Some(&SessionStatus::Ended)
    );

    let recorded = callbacks.count().await;
    peer.deliver(&ApplicationMessage::ping());
    peer.emit(TransportEvent::PathFailed);
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(callbacks.count().await, recorded, "no callback after end_session");
    assert!(harness.created.try_recv().is_err());

    // Ending twice is harmless.
    harness.orchestrator.end_session().await;
    assert_eq!(callbacks.count().await, recorded);
}
