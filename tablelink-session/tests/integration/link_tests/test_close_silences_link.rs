use std::time::Duration;
use tablelink_core::ApplicationMessage;
use tablelink_session::{LinkConfig, TransportEvent};

use crate::integration::link_tests::connected_host_link;
use crate::integration::{LinkHarness, init_tracing};
use crate::utils::{WAIT, drain, eventually};

#[tokio::test(start_paused = true)]
async fn test_close_silences_link() {
    init_tracing();

    let mut harness = LinkHarness::new().await;
    let (handle, peer) = connected_host_link(&mut harness, LinkConfig::default()).await;
    drain(&mut harness.events);

    let sender = handle.sender().clone();
    handle.close();
    assert!(!sender.is_alive());

    // Late transport activity must not leak out of a closed link.
    peer.emit(TransportEvent::PathFailed);
    peer.deliver(&ApplicationMessage::ping());

    assert!(
        eventually(WAIT, || {
            let peer = peer.clone();
            async move { peer.is_closed() }
        })
        .await
    );
    assert!(!sender.send(ApplicationMessage::ping()).await);

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut harness.events).is_empty());
    assert!(harness.created.try_recv().is_err());
}
