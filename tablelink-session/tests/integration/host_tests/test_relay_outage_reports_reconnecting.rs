use std::time::Duration;
use tablelink_session::{SessionEvent, SessionStatus};

use crate::integration::{HostHarness, init_tracing, statuses, test_config, wait_session_event};

#[tokio::test(start_paused = true)]
async fn test_relay_outage_reports_reconnecting() {
    init_tracing();

    let mut harness = HostHarness::start(test_config()).await;

    harness.relay.set_failing(Some(503)).await;
    let mut seen = wait_session_event(&mut harness.events, |event| {
        matches!(event, SessionEvent::StatusChanged(SessionStatus::Reconnecting))
    })
    .await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    harness.relay.set_failing(None).await;
    seen.extend(
        wait_session_event(&mut harness.events, |event| {
            matches!(event, SessionEvent::StatusChanged(SessionStatus::Connected))
        })
        .await,
    );

    assert_eq!(
        statuses(&seen),
        vec![
            SessionStatus::Connected,
            SessionStatus::Reconnecting,
            SessionStatus::Connected,
        ]
    );
}
