use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::guest::GuestSessionManager;
use crate::host::HostSessionManager;
use crate::orchestrator::{
    NoopCallbacks, SessionCallbacks, SessionEvent, SessionRole, SessionState, SessionStatus,
};
use crate::relay::{HttpRelay, SignalingTransport};
use crate::transport::{TransportFactory, WebrtcTransportFactory};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tablelink_core::{
    ApplicationMessage, ChatMessage, DeviceId, JoinedRoom, RestartReason, Room, RoomId,
};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

type SharedCallbacks = Arc<RwLock<Arc<dyn SessionCallbacks>>>;

enum Manager {
    Host(HostSessionManager),
    Guest(GuestSessionManager),
}

struct ActiveSession {
    manager: Manager,
    status: watch::Receiver<SessionStatus>,
    dispatcher: JoinHandle<()>,
}

impl ActiveSession {
    async fn end(self) {
        match self.manager {
            Manager::Host(manager) => manager.close().await,
            Manager::Guest(manager) => manager.close().await,
        }
        self.dispatcher.abort();
        let _ = self.dispatcher.await;
    }
}

/// Single entry point for the application: runs at most one host or guest
/// session at a time and forwards everything it reports to the registered
/// [`SessionCallbacks`].
pub struct SessionOrchestrator {
    config: SessionConfig,
    device_id: DeviceId,
    signaling: Arc<dyn SignalingTransport>,
    factory: Arc<dyn TransportFactory>,
    callbacks: SharedCallbacks,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionOrchestrator {
    pub fn new(
        config: SessionConfig,
        device_id: DeviceId,
        signaling: Arc<dyn SignalingTransport>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            config,
            device_id,
            signaling,
            factory,
            callbacks: Arc::new(RwLock::new(Arc::new(NoopCallbacks))),
            active: Mutex::new(None),
        }
    }

    /// Orchestrator talking to the HTTP relay in `config` and negotiating
    /// with webrtc.
    pub fn over_http(config: SessionConfig, device_id: DeviceId) -> SessionResult<Self> {
        let relay = HttpRelay::from_config(&config)?;
        let factory = WebrtcTransportFactory::new(config.ice_servers.clone());
        Ok(Self::new(config, device_id, Arc::new(relay), Arc::new(factory)))
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Swaps the callbacks. A running session keeps going and reports to
    /// the new set from the next event on.
    pub async fn set_callbacks(&self, callbacks: Arc<dyn SessionCallbacks>) {
        *self.callbacks.write().await = callbacks;
    }

    pub async fn start_host_session(
        &self,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> SessionResult<Room> {
        let mut active = self.active.lock().await;
        self.replace(&mut active, callbacks).await;

        let (events, dispatcher, status) = self.spawn_dispatcher();
        let started = HostSessionManager::start(
            &self.config,
            self.device_id.clone(),
            self.signaling.clone(),
            self.factory.clone(),
            events,
        )
        .await;

        let manager = match started {
            Ok(manager) => manager,
            Err(e) => {
                dispatcher.abort();
                return Err(e);
            }
        };
        let room = manager.room().clone();
        *active = Some(ActiveSession {
            manager: Manager::Host(manager),
            status,
            dispatcher,
        });
        Ok(room)
    }

    pub async fn start_player_session(
        &self,
        room_id: RoomId,
        hello: Map<String, Value>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> SessionResult<JoinedRoom> {
        let mut active = self.active.lock().await;
        self.replace(&mut active, callbacks).await;

        let (events, dispatcher, status) = self.spawn_dispatcher();
        let started = GuestSessionManager::start(
            &self.config,
            self.device_id.clone(),
            room_id,
            hello,
            self.signaling.clone(),
            self.factory.clone(),
            events,
        )
        .await;

        let manager = match started {
            Ok(manager) => manager,
            Err(e) => {
                dispatcher.abort();
                return Err(e);
            }
        };
        let joined = manager.joined().clone();
        *active = Some(ActiveSession {
            manager: Manager::Guest(manager),
            status,
            dispatcher,
        });
        Ok(joined)
    }

    /// Tears the current session down. Once this returns no timer, poller
    /// or link of that session is left and no further callback fires.
    pub async fn end_session(&self) {
        let mut active = self.active.lock().await;
        self.teardown(&mut active).await;
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn send_to_peer(&self, peer: &DeviceId, message: ApplicationMessage) -> bool {
        let active = self.active.lock().await;
        match active.as_ref().map(|session| &session.manager) {
            Some(Manager::Host(manager)) => manager.send_to(peer, message).await,
            Some(Manager::Guest(manager)) if manager.host_id() == peer => {
                manager.send(message).await
            }
            _ => false,
        }
    }

    /// Host: every connected guest. Guest: the host. Returns the number of
    /// peers that accepted the message.
    pub async fn broadcast(&self, message: ApplicationMessage) -> usize {
        let active = self.active.lock().await;
        match active.as_ref().map(|session| &session.manager) {
            Some(Manager::Host(manager)) => manager.broadcast(message).await,
            Some(Manager::Guest(manager)) => usize::from(manager.send(message).await),
            None => 0,
        }
    }

    /// Guests only.
    pub async fn send_character_update(&self, fields: Map<String, Value>) -> bool {
        self.send_to_host(ApplicationMessage::character_update(fields))
            .await
    }

    /// Guests only.
    pub async fn send_dice_roll(&self, fields: Map<String, Value>) -> bool {
        self.send_to_host(ApplicationMessage::dice_roll(fields))
            .await
    }

    /// Text beyond the chat limit is cut before sending.
    pub async fn send_chat_message(
        &self,
        text: &str,
        sender_name: &str,
        sender_icon: Option<String>,
    ) -> bool {
        let chat = ChatMessage::new(text, sender_name, sender_icon);
        self.broadcast(ApplicationMessage::chat(chat)).await > 0
    }

    /// Hosts only: renegotiates the link to `peer`, or reconnects it if it
    /// had failed.
    pub async fn request_restart(&self, peer: &DeviceId) -> SessionResult<()> {
        let active = self.active.lock().await;
        match active.as_ref().map(|session| &session.manager) {
            Some(Manager::Host(manager)) => {
                manager.request_restart(peer, RestartReason::Manual).await
            }
            Some(Manager::Guest(_)) => Err(SessionError::PeerNotFound(peer.clone())),
            None => Err(SessionError::Closed),
        }
    }

    pub async fn session_state(&self) -> Option<SessionState> {
        let active = self.active.lock().await;
        let session = active.as_ref()?;
        let status = *session.status.borrow();

        let state = match &session.manager {
            Manager::Host(manager) => SessionState {
                role: SessionRole::Host,
                status,
                room_id: manager.room_id().clone(),
                host_id: None,
                peers: manager.peers().await,
            },
            Manager::Guest(manager) => SessionState {
                role: SessionRole::Guest,
                status,
                room_id: manager.room_id().clone(),
                host_id: Some(manager.host_id().clone()),
                peers: BTreeMap::new(),
            },
        };
        Some(state)
    }

    async fn send_to_host(&self, message: ApplicationMessage) -> bool {
        let active = self.active.lock().await;
        match active.as_ref().map(|session| &session.manager) {
            Some(Manager::Guest(manager)) => manager.send(message).await,
            _ => false,
        }
    }

    async fn replace(&self, active: &mut Option<ActiveSession>, callbacks: Arc<dyn SessionCallbacks>) {
        self.teardown(active).await;
        *self.callbacks.write().await = callbacks;
    }

    async fn teardown(&self, active: &mut Option<ActiveSession>) {
        let Some(session) = active.take() else {
            return;
        };
        info!(device_id = %self.device_id, "ending session");
        session.end().await;

        let callbacks = self.callbacks.read().await.clone();
        callbacks.on_status_changed(SessionStatus::Ended).await;
    }

    fn spawn_dispatcher(
        &self,
    ) -> (
        mpsc::UnboundedSender<SessionEvent>,
        JoinHandle<()>,
        watch::Receiver<SessionStatus>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::Connecting);
        let dispatcher = tokio::spawn(dispatch(events_rx, self.callbacks.clone(), status_tx));
        (events_tx, dispatcher, status_rx)
    }
}

/// Delivers session events to whichever callbacks are registered when each
/// event comes up.
async fn dispatch(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    callbacks: SharedCallbacks,
    status: watch::Sender<SessionStatus>,
) {
    while let Some(event) = events.recv().await {
        let callbacks = callbacks.read().await.clone();

        match event {
            SessionEvent::PeerConnected { peer, info } => {
                callbacks.on_peer_connected(&peer, info.as_ref()).await;
            }
            SessionEvent::PeerDisconnected { peer } => {
                callbacks.on_peer_disconnected(&peer).await;
            }
            SessionEvent::Message { peer, message } => {
                callbacks.on_message(&peer, &message).await;
            }
            SessionEvent::Error { peer, error } => {
                callbacks.on_error(peer.as_ref(), &error).await;
            }
            SessionEvent::RestartRequired {
                peer,
                reason,
                attempt,
            } => {
                callbacks.on_restart_required(&peer, reason, attempt).await;
            }
            SessionEvent::StatusChanged(next) => {
                status.send_replace(next);
                callbacks.on_status_changed(next).await;
            }
        }
    }
}
