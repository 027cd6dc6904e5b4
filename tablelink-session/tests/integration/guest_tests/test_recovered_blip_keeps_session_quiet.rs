use std::time::Duration;
use tablelink_session::{LinkState, SessionEvent, TransportEvent};

use crate::integration::{GuestHarness, init_tracing, test_config};
use crate::utils::{WAIT, eventually};

#[tokio::test(start_paused = true)]
async fn test_recovered_blip_keeps_session_quiet() {
    init_tracing();

    let mut harness = GuestHarness::start(test_config()).await;
    let peer = harness.connect().await;
    let greeted = eventually(WAIT, || {
        let peer = peer.clone();
        async move { peer.sent_kinds().await.contains(&"hello") }
    })
    .await;
    assert!(greeted);
    while harness.events.try_recv().is_ok() {}

    peer.emit(TransportEvent::PathDisconnected);
    tokio::time::sleep(Duration::from_secs(3)).await;
    peer.emit(TransportEvent::PathConnected);

    // Past the grace deadline: nothing was restarted or re-announced.
    tokio::time::sleep(Duration::from_secs(30)).await;
    while let Ok(event) = harness.events.try_recv() {
        assert!(
            !matches!(
                event,
                SessionEvent::PeerConnected { .. }
                    | SessionEvent::PeerDisconnected { .. }
                    | SessionEvent::StatusChanged(_)
                    | SessionEvent::RestartRequired { .. }
            ),
            "unexpected {event:?}"
        );
    }
    assert_eq!(harness.manager.link_state().await, Some(LinkState::Connected));

    let hellos = peer
        .sent_kinds()
        .await
        .into_iter()
        .filter(|kind| *kind == "hello")
        .count();
    assert_eq!(hellos, 1, "hello belongs to the channel opening only");
    assert!(!peer.is_closed());
}
