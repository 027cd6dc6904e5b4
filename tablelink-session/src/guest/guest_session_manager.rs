use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::guest::{GuestCommand, GuestSession};
use crate::link::{LinkContext, LinkState};
use crate::orchestrator::SessionEvent;
use crate::relay::{RelayPoller, SignalingTransport};
use crate::transport::TransportFactory;
use serde_json::{Map, Value};
use std::sync::Arc;
use tablelink_core::{ApplicationMessage, DeviceId, JoinedRoom, RoomId, SignalEnvelope};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// Guest side of a session: one link to the host, created when the host's
/// offer shows up in the mailbox.
pub struct GuestSessionManager {
    room_id: RoomId,
    joined: JoinedRoom,
    device_id: DeviceId,
    commands: mpsc::UnboundedSender<GuestCommand>,
    task: JoinHandle<()>,
}

impl GuestSessionManager {
    /// Joins `room_id` and starts mailbox and heartbeat polling. `hello` is
    /// sent to the host every time the channel opens.
    pub async fn start(
        config: &SessionConfig,
        device_id: DeviceId,
        room_id: RoomId,
        hello: Map<String, Value>,
        signaling: Arc<dyn SignalingTransport>,
        factory: Arc<dyn TransportFactory>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionResult<Self> {
        let joined = signaling.join_room(&room_id, &device_id).await?;
        info!(room_id = %room_id, host = %joined.host_id, "joined room");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        let ctx = LinkContext {
            local: device_id.clone(),
            room_id: room_id.clone(),
            config: config.link.clone(),
            signaling: signaling.clone(),
            factory,
            events: link_tx,
        };

        let poller = RelayPoller::new(
            signaling,
            room_id.clone(),
            device_id.clone(),
            command_tx.clone(),
        );
        let pollers = vec![
            poller.mailbox(config.mailbox_poll),
            poller.heartbeat(config.heartbeat),
        ];

        let session = GuestSession::new(
            ctx,
            joined.host_id.clone(),
            hello,
            pollers,
            command_rx,
            link_rx,
            events,
        );
        let task = tokio::spawn(session.run());

        Ok(Self {
            room_id,
            joined,
            device_id,
            commands: command_tx,
            task,
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn host_id(&self) -> &DeviceId {
        &self.joined.host_id
    }

    pub fn joined(&self) -> &JoinedRoom {
        &self.joined
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub async fn route_inbound_signal(&self, envelope: SignalEnvelope) -> bool {
        self.request(|reply| GuestCommand::Route { envelope, reply })
            .await
            .unwrap_or(false)
    }

    /// Sends to the host. `false` when no channel is open.
    pub async fn send(&self, message: ApplicationMessage) -> bool {
        self.request(|reply| GuestCommand::Send { message, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn link_state(&self) -> Option<LinkState> {
        self.request(GuestCommand::LinkState).await.ok().flatten()
    }

    pub async fn close(mut self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(GuestCommand::Close(reply)).is_ok() {
            let _ = done.await;
        }
        let _ = (&mut self.task).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> GuestCommand,
    ) -> SessionResult<T> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::Closed)?;
        outcome.await.map_err(|_| SessionError::Closed)
    }
}

impl Drop for GuestSessionManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}
