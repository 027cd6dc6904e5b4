use std::time::Duration;
use tablelink_core::DeviceId;
use tablelink_session::{LinkConfig, SessionConfig, SessionError, SessionEvent, SignalingTransport};

use crate::integration::{HostHarness, init_tracing, test_config, wait_session_event};
use crate::utils::next_peer;

#[tokio::test(start_paused = true)]
async fn test_failed_guest_ignored_until_it_leaves() {
    init_tracing();

    let config = SessionConfig {
        link: LinkConfig {
            restart_cap: 0,
            ..LinkConfig::default()
        },
        ..test_config()
    };
    let mut harness = HostHarness::start(config).await;
    let alice = DeviceId::from("alice");
    harness.invite(&alice).await;

    // Never answered: the first connect ceiling exhausts a zero budget.
    wait_session_event(&mut harness.events, |event| {
        matches!(
            event,
            SessionEvent::Error { error: SessionError::RestartExhausted { .. }, .. }
        )
    })
    .await;

    // Still listed by the relay, but discovery leaves it alone.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(harness.created.try_recv().is_err());
    assert!(!harness.manager.peers().await.contains_key(&alice));

    // Once it drops off the listing and rejoins, it gets a fresh link.
    harness.relay.remove_participant(&harness.room_id(), &alice).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    harness.relay.join_room(&harness.room_id(), &alice).await.unwrap();

    let again = next_peer(&mut harness.created).await;
    assert_eq!(again.remote, alice);
}
