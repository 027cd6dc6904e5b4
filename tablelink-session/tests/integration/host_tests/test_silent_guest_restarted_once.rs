use std::time::Duration;
use tablelink_core::{DeviceId, RestartReason, SignalKind};
use tablelink_session::{SessionConfig, SessionEvent};

use crate::integration::{HostHarness, init_tracing, test_config, wait_session_event};

#[tokio::test(start_paused = true)]
async fn test_silent_guest_restarted_once() {
    init_tracing();

    let config = SessionConfig {
        keepalive_interval: Duration::from_secs(3),
        silence_timeout: Duration::from_secs(9),
        ..test_config()
    };
    let mut harness = HostHarness::start(config).await;
    let alice = DeviceId::from("alice");
    let first = harness.admit(&alice).await;
    let connected_at = tokio::time::Instant::now();

    // The guest never answers pings. It stays connected through the grace
    // period and only drops when the restart begins.
    let events = wait_session_event(&mut harness.events, |event| {
        matches!(event, SessionEvent::PeerDisconnected { peer } if peer == &alice)
    })
    .await;

    // Suspected after the silence timeout, restarted once grace ran out.
    assert!(connected_at.elapsed() >= Duration::from_secs(9 + 12));
    let restarts: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::RestartRequired { .. }))
        .collect();
    assert_eq!(restarts.len(), 1);
    assert!(matches!(
        restarts[0],
        SessionEvent::RestartRequired {
            reason: RestartReason::GraceTimeout,
            attempt: 1,
            ..
        }
    ));

    let offers = harness.relay.pushed_to(&alice, SignalKind::Offer).await;
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[1].restart_reason(), Some(RestartReason::GraceTimeout));
    assert!(first.sent_kinds().await.contains(&"ping"));
}
