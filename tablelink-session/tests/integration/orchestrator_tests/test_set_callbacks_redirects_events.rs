use tablelink_core::DeviceId;

use crate::integration::orchestrator_tests::OrchestratorHarness;
use crate::integration::{init_tracing, test_config};
use crate::utils::{Recorded, RecordingCallbacks};

#[tokio::test(start_paused = true)]
async fn test_set_callbacks_redirects_events() {
    init_tracing();

    let mut harness = OrchestratorHarness::new("host", test_config());
    let before = RecordingCallbacks::new();
    let after = RecordingCallbacks::new();

    let room = harness
        .orchestrator
        .start_host_session(before.clone())
        .await
        .unwrap();
    harness.orchestrator.set_callbacks(after.clone()).await;

    let alice = DeviceId::from("alice");
    harness.admit(&room.room_id, &alice, &after).await;

    assert!(harness.orchestrator.is_active().await);
    assert!(
        !before
            .events()
            .await
            .iter()
            .any(|r| matches!(r, Recorded::Connected { .. }))
    );
}
