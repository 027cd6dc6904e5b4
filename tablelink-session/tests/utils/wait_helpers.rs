use crate::utils::MockPeer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tablelink_session::{LinkEvent, LinkEventKind, LinkState};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

pub const WAIT: Duration = Duration::from_secs(60);

/// Next transport handed out by a `MockTransportFactory`.
pub async fn next_peer(created: &mut mpsc::UnboundedReceiver<Arc<MockPeer>>) -> Arc<MockPeer> {
    timeout(WAIT, created.recv())
        .await
        .expect("no transport was created in time")
        .expect("transport factory dropped")
}

/// Re-runs `check` every few milliseconds until it holds or `limit` passes.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Collects link events until one satisfies `stop`, returning all of them.
pub async fn events_until<F>(rx: &mut mpsc::UnboundedReceiver<LinkEvent>, stop: F) -> Vec<LinkEvent>
where
    F: Fn(&LinkEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = timeout(WAIT, rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out, events so far: {seen:?}"))
            .expect("link event channel closed");
        let done = stop(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub async fn wait_for_state(
    rx: &mut mpsc::UnboundedReceiver<LinkEvent>,
    state: LinkState,
) -> Vec<LinkEvent> {
    events_until(rx, |event| is_state(event, state)).await
}

pub fn is_state(event: &LinkEvent, state: LinkState) -> bool {
    matches!(event.kind, LinkEventKind::StateChanged(s) if s == state)
}

/// Drains whatever is queued right now without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> Vec<LinkEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}

pub fn restarts(events: &[LinkEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e.kind, LinkEventKind::RestartRequired { .. }))
        .count()
}
