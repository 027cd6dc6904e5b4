use std::time::Duration;
use tablelink_session::{LinkConfig, LinkEventKind, TransportEvent};

use crate::integration::link_tests::connected_host_link;
use crate::integration::{LinkHarness, init_tracing};
use crate::utils::{drain, restarts};

#[tokio::test(start_paused = true)]
async fn test_recovery_within_grace() {
    init_tracing();

    let mut harness = LinkHarness::new().await;
    let (_handle, peer) = connected_host_link(&mut harness, LinkConfig::default()).await;

    peer.emit(TransportEvent::PathDisconnected);
    tokio::time::sleep(Duration::from_secs(5)).await;
    peer.emit(TransportEvent::PathConnected);

    // Well past the original grace deadline.
    tokio::time::sleep(Duration::from_secs(30)).await;
    let events = drain(&mut harness.events);
    assert_eq!(restarts(&events), 0);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e.kind, LinkEventKind::StateChanged(_))),
        "a recovered blip must not leave CONNECTED: {events:?}"
    );
    assert!(harness.created.try_recv().is_err(), "no new transport expected");
    assert!(!peer.is_closed());
}
