use crate::config::PollingConfig;
use crate::error::{SessionError, SessionResult};
use crate::polling::{PollHandle, PollingLoop};
use crate::relay::SignalingTransport;
use std::future::Future;
use std::sync::Arc;
use tablelink_core::{DeviceId, RoomId, SignalEnvelope};
use tokio::sync::mpsc;
use tracing::warn;

/// Outcome of one relay poll, delivered to a session actor.
#[derive(Debug)]
pub(crate) enum RelayUpdate {
    Signals(Vec<SignalEnvelope>),
    Participants(Vec<DeviceId>),
    Heartbeat,
    Failed(SessionError),
}

/// Spawns the relay pollers of one session, feeding every result into the
/// session's command queue.
pub(crate) struct RelayPoller<C> {
    signaling: Arc<dyn SignalingTransport>,
    room_id: RoomId,
    device_id: DeviceId,
    updates: mpsc::UnboundedSender<C>,
}

impl<C> RelayPoller<C>
where
    C: From<RelayUpdate> + Send + 'static,
{
    pub(crate) fn new(
        signaling: Arc<dyn SignalingTransport>,
        room_id: RoomId,
        device_id: DeviceId,
        updates: mpsc::UnboundedSender<C>,
    ) -> Self {
        Self {
            signaling,
            room_id,
            device_id,
            updates,
        }
    }

    pub(crate) fn mailbox(&self, config: PollingConfig) -> PollHandle {
        self.spawn(
            "mailbox",
            config,
            |signaling, room_id, device_id| async move {
                signaling.pull_signals(&room_id, &device_id).await
            },
            |batch: Vec<SignalEnvelope>| {
                let fresh = !batch.is_empty();
                (RelayUpdate::Signals(batch), fresh)
            },
        )
    }

    pub(crate) fn discovery(&self, config: PollingConfig) -> PollHandle {
        self.spawn(
            "discovery",
            config,
            |signaling, room_id, device_id| async move {
                signaling.list_participants(&room_id, &device_id).await
            },
            |listed: Vec<DeviceId>| (RelayUpdate::Participants(listed), false),
        )
    }

    pub(crate) fn heartbeat(&self, config: PollingConfig) -> PollHandle {
        self.spawn(
            "heartbeat",
            config,
            |signaling, room_id, device_id| async move {
                signaling.heartbeat(&room_id, &device_id).await
            },
            |()| (RelayUpdate::Heartbeat, false),
        )
    }

    fn spawn<T, F, Fut>(
        &self,
        name: &'static str,
        config: PollingConfig,
        fetch: F,
        wrap: fn(T) -> (RelayUpdate, bool),
    ) -> PollHandle
    where
        T: Send + 'static,
        F: Fn(Arc<dyn SignalingTransport>, RoomId, DeviceId) -> Fut + Send + 'static,
        Fut: Future<Output = SessionResult<T>> + Send + 'static,
    {
        let signaling = self.signaling.clone();
        let room_id = self.room_id.clone();
        let device_id = self.device_id.clone();
        let updates = self.updates.clone();
        let failures = self.updates.clone();

        PollingLoop::spawn(
            name,
            config,
            move || fetch(signaling.clone(), room_id.clone(), device_id.clone()),
            move |value| {
                let (update, fresh) = wrap(value);
                let _ = updates.send(C::from(update));
                fresh
            },
            move |e, retry_in| {
                warn!(poller = name, ?retry_in, "relay poll failed: {e}");
                let _ = failures.send(C::from(RelayUpdate::Failed(e.clone())));
            },
        )
    }
}
