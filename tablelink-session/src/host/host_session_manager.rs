use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::host::{HostCommand, HostSession};
use crate::link::LinkContext;
use crate::orchestrator::{PeerSummary, SessionEvent};
use crate::relay::{RelayPoller, RelayUpdate, SignalingTransport};
use crate::transport::TransportFactory;
use std::collections::BTreeMap;
use std::sync::Arc;
use tablelink_core::{ApplicationMessage, DeviceId, RestartReason, Room, RoomId, SignalEnvelope};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// Host side of a session: owns the room and one link per guest.
///
/// The links live inside a dedicated actor task; this handle only queues
/// commands to it. Dropping the handle without [`close`](Self::close) aborts
/// the actor, which still releases every link and poller.
pub struct HostSessionManager {
    room: Room,
    device_id: DeviceId,
    signaling: Arc<dyn SignalingTransport>,
    commands: mpsc::UnboundedSender<HostCommand>,
    task: JoinHandle<()>,
}

impl HostSessionManager {
    /// Creates the room on the relay and starts discovery, mailbox and
    /// heartbeat polling.
    pub async fn start(
        config: &SessionConfig,
        device_id: DeviceId,
        signaling: Arc<dyn SignalingTransport>,
        factory: Arc<dyn TransportFactory>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionResult<Self> {
        let room = signaling.create_room(&device_id).await?;
        info!(room_id = %room.room_id, device_id = %device_id, "hosting room");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        let ctx = LinkContext {
            local: device_id.clone(),
            room_id: room.room_id.clone(),
            config: config.link.clone(),
            signaling: signaling.clone(),
            factory,
            events: link_tx,
        };

        let poller = RelayPoller::new(
            signaling.clone(),
            room.room_id.clone(),
            device_id.clone(),
            command_tx.clone(),
        );
        let pollers = vec![
            poller.mailbox(config.mailbox_poll),
            poller.discovery(config.discovery_poll),
            poller.heartbeat(config.heartbeat),
        ];

        let session = HostSession::new(ctx, config, pollers, command_rx, link_rx, events);
        let task = tokio::spawn(session.run());

        Ok(Self {
            room,
            device_id,
            signaling,
            commands: command_tx,
            task,
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room.room_id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Lists participants right now instead of waiting for the next discovery
    /// tick, and starts negotiating with any new ones. Returns how many
    /// participants the relay listed.
    pub async fn discover_and_connect(&self) -> SessionResult<usize> {
        let listed = self
            .signaling
            .list_participants(&self.room.room_id, &self.device_id)
            .await?;
        let count = listed.len();
        self.commands
            .send(HostCommand::Relay(RelayUpdate::Participants(listed)))
            .map_err(|_| SessionError::Closed)?;
        Ok(count)
    }

    /// Hands an envelope to the link it belongs to. Returns `false` when the
    /// envelope was addressed elsewhere or no link matches its sender.
    pub async fn route_inbound_signal(&self, envelope: SignalEnvelope) -> bool {
        self.request(|reply| HostCommand::Route { envelope, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn send_to(&self, peer: &DeviceId, message: ApplicationMessage) -> bool {
        let peer = peer.clone();
        self.request(|reply| HostCommand::SendTo {
            peer,
            message,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Sends to every open link and returns how many accepted the message.
    pub async fn broadcast(&self, message: ApplicationMessage) -> usize {
        self.request(|reply| HostCommand::Broadcast { message, reply })
            .await
            .unwrap_or(0)
    }

    pub async fn request_restart(
        &self,
        peer: &DeviceId,
        reason: RestartReason,
    ) -> SessionResult<()> {
        let peer = peer.clone();
        self.request(|reply| HostCommand::Restart {
            peer,
            reason,
            reply,
        })
        .await?
    }

    pub async fn peers(&self) -> BTreeMap<DeviceId, PeerSummary> {
        self.request(HostCommand::Peers).await.unwrap_or_default()
    }

    /// Stops polling, closes every link and tells the relay the room is gone.
    pub async fn close(mut self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(HostCommand::Close(reply)).is_ok() {
            let _ = done.await;
        }
        let _ = (&mut self.task).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HostCommand,
    ) -> SessionResult<T> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::Closed)?;
        outcome.await.map_err(|_| SessionError::Closed)
    }
}

impl Drop for HostSessionManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}
