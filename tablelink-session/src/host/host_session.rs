use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::host::HostCommand;
use crate::link::{LinkContext, LinkEvent, LinkEventKind, LinkHandle, LinkSender, LinkState, PeerLink};
use crate::orchestrator::{PeerSummary, SessionEvent, SessionStatus, StatusTracker};
use crate::polling::PollHandle;
use crate::relay::RelayUpdate;
use futures::future::join_all;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tablelink_core::{ApplicationMessage, DeviceId, MessageBody, RestartReason, SignalEnvelope, SignalKind};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

struct PeerSlot {
    handle: LinkHandle,
    state: LinkState,
    info: Option<Map<String, Value>>,
    last_seen: Instant,
    suspected: bool,
    /// `PeerConnected` was reported and not yet matched by `PeerDisconnected`.
    announced: bool,
}

impl PeerSlot {
    fn new(handle: LinkHandle) -> Self {
        Self {
            handle,
            state: LinkState::Idle,
            info: None,
            last_seen: Instant::now(),
            suspected: false,
            announced: false,
        }
    }

    fn sender(&self) -> &LinkSender {
        self.handle.sender()
    }
}

/// Actor owning every link of a hosted room. Nothing outside this task
/// touches the link map.
pub(crate) struct HostSession {
    ctx: LinkContext,
    keepalive_interval: Duration,
    silence_timeout: Duration,
    links: HashMap<DeviceId, PeerSlot>,
    failed: HashSet<DeviceId>,
    pollers: Vec<PollHandle>,
    status: StatusTracker,
    events: mpsc::UnboundedSender<SessionEvent>,
    command_rx: mpsc::UnboundedReceiver<HostCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl HostSession {
    pub(crate) fn new(
        ctx: LinkContext,
        config: &SessionConfig,
        pollers: Vec<PollHandle>,
        command_rx: mpsc::UnboundedReceiver<HostCommand>,
        link_rx: mpsc::UnboundedReceiver<LinkEvent>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            ctx,
            keepalive_interval: config.keepalive_interval,
            silence_timeout: config.silence_timeout,
            links: HashMap::new(),
            failed: HashSet::new(),
            pollers,
            status: StatusTracker::new(SessionStatus::Connected, events.clone()),
            events,
            command_rx,
            link_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(room_id = %self.ctx.room_id, "host session loop started");

        let mut keepalive = interval(self.keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(HostCommand::Close(reply)) => {
                            self.shutdown().await;
                            let _ = reply.send(());
                            break;
                        }
                        Some(c) => self.handle_command(c),
                        None => {
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.link_rx.recv() => self.handle_link_event(evt),

                _ = keepalive.tick() => self.keepalive(),
            }
        }

        info!(room_id = %self.ctx.room_id, "host session loop finished");
    }

    fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Relay(update) => self.handle_relay(update),

            HostCommand::Route { envelope, reply } => {
                let _ = reply.send(self.route_signal(envelope));
            }

            HostCommand::SendTo {
                peer,
                message,
                reply,
            } => {
                let Some(slot) = self.links.get(&peer) else {
                    debug!(peer = %peer, "send to unknown peer");
                    let _ = reply.send(false);
                    return;
                };
                let sender = slot.sender().clone();
                tokio::spawn(async move {
                    let _ = reply.send(sender.send(message).await);
                });
            }

            HostCommand::Broadcast { message, reply } => {
                let senders: Vec<LinkSender> = self
                    .links
                    .values()
                    .filter(|slot| {
                        matches!(slot.state, LinkState::Connected | LinkState::Reconnecting)
                    })
                    .map(|slot| slot.sender().clone())
                    .collect();
                tokio::spawn(async move {
                    let sent = join_all(senders.iter().map(|s| s.send(message.clone()))).await;
                    let _ = reply.send(sent.into_iter().filter(|ok| *ok).count());
                });
            }

            HostCommand::Restart {
                peer,
                reason,
                reply,
            } => {
                let _ = reply.send(self.restart(peer, reason));
            }

            HostCommand::Peers(reply) => {
                let _ = reply.send(self.peers());
            }

            // Handled by the run loop.
            HostCommand::Close(_) => {}
        }
    }

    fn handle_relay(&mut self, update: RelayUpdate) {
        match update {
            RelayUpdate::Signals(batch) => {
                self.status.relay_ok();
                for envelope in batch {
                    self.route_signal(envelope);
                }
            }
            RelayUpdate::Participants(listed) => {
                self.status.relay_ok();
                self.discover(listed);
            }
            RelayUpdate::Heartbeat => self.status.relay_ok(),
            RelayUpdate::Failed(_) => self.status.relay_failed(),
        }
    }

    /// Connects to every listed participant without a link. Participants
    /// whose link failed stay ignored until they drop off the listing.
    fn discover(&mut self, listed: Vec<DeviceId>) {
        self.failed.retain(|peer| listed.contains(peer));

        for peer in listed {
            if peer == self.ctx.local
                || self.links.contains_key(&peer)
                || self.failed.contains(&peer)
            {
                continue;
            }
            info!(peer = %peer, "participant discovered, negotiating");
            self.connect(peer);
        }
    }

    fn connect(&mut self, peer: DeviceId) {
        let handle = PeerLink::spawn_host(self.ctx.clone(), peer.clone());
        self.links.insert(peer, PeerSlot::new(handle));
    }

    fn route_signal(&mut self, envelope: SignalEnvelope) -> bool {
        if !envelope.is_addressed_to(&self.ctx.local) {
            debug!(from = %envelope.from, to = ?envelope.to, "signal for another device ignored");
            return false;
        }
        if envelope.kind == SignalKind::Offer {
            warn!(from = %envelope.from, "host received an offer, ignored");
            return false;
        }
        let Some(slot) = self.links.get(&envelope.from) else {
            debug!(from = %envelope.from, kind = ?envelope.kind, "signal from unknown peer dropped");
            return false;
        };
        slot.sender().signal(envelope)
    }

    fn restart(&mut self, peer: DeviceId, reason: RestartReason) -> SessionResult<()> {
        if let Some(slot) = self.links.get(&peer) {
            return if slot.sender().restart(reason) {
                Ok(())
            } else {
                Err(SessionError::Closed)
            };
        }
        if self.failed.remove(&peer) {
            info!(peer = %peer, %reason, "reconnecting failed peer on request");
            self.connect(peer);
            return Ok(());
        }
        Err(SessionError::PeerNotFound(peer))
    }

    fn peers(&self) -> BTreeMap<DeviceId, PeerSummary> {
        self.links
            .iter()
            .map(|(peer, slot)| {
                let summary = PeerSummary {
                    device_id: peer.clone(),
                    link_state: slot.state,
                    info: slot.info.clone(),
                };
                (peer.clone(), summary)
            })
            .collect()
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        let LinkEvent { peer, kind } = event;

        match kind {
            LinkEventKind::StateChanged(state) => self.on_link_state(peer, state),
            LinkEventKind::ChannelOpened => {}
            LinkEventKind::Message(message) => self.on_peer_message(peer, message),
            LinkEventKind::RestartRequired { reason, attempt } => {
                self.emit(SessionEvent::RestartRequired {
                    peer,
                    reason,
                    attempt,
                });
            }
            LinkEventKind::Error(error) => {
                self.emit(SessionEvent::Error {
                    peer: Some(peer),
                    error,
                });
            }
        }
    }

    fn on_link_state(&mut self, peer: DeviceId, state: LinkState) {
        let Some(slot) = self.links.get_mut(&peer) else {
            return;
        };
        slot.state = state;

        match state {
            LinkState::Connected => {
                slot.last_seen = Instant::now();
                slot.suspected = false;
                if !slot.announced {
                    slot.announced = true;
                    let info = slot.info.clone();
                    self.emit(SessionEvent::PeerConnected { peer, info });
                }
            }
            LinkState::Failed | LinkState::Closed => {
                let Some(slot) = self.links.remove(&peer) else {
                    return;
                };
                if state == LinkState::Failed {
                    warn!(peer = %peer, "link failed, waiting for the peer to rejoin");
                    self.failed.insert(peer.clone());
                }
                tokio::spawn(slot.handle.shutdown());
                if slot.announced {
                    self.emit(SessionEvent::PeerDisconnected { peer });
                }
            }
            _ => {
                if slot.announced {
                    slot.announced = false;
                    self.emit(SessionEvent::PeerDisconnected { peer });
                }
            }
        }
    }

    fn on_peer_message(&mut self, peer: DeviceId, message: ApplicationMessage) {
        let local = self.ctx.local.clone();
        let Some(slot) = self.links.get_mut(&peer) else {
            return;
        };
        slot.last_seen = Instant::now();
        slot.suspected = false;

        match &message.body {
            MessageBody::Hello(info) => {
                debug!(peer = %peer, "hello received");
                slot.info = Some(info.clone());
                let mut fields = Map::new();
                fields.insert("hostId".to_owned(), json!(local));
                slot.sender().post(ApplicationMessage::ack(fields));
            }
            MessageBody::Pong => return,
            MessageBody::Ping => {
                slot.sender().post(ApplicationMessage::pong());
                return;
            }
            _ => {}
        }

        self.emit(SessionEvent::Message { peer, message });
    }

    /// Pings every open channel and flags peers that went quiet.
    fn keepalive(&mut self) {
        let now = Instant::now();

        for (peer, slot) in self.links.iter_mut() {
            if !matches!(slot.state, LinkState::Connected | LinkState::Reconnecting) {
                continue;
            }
            if slot.state == LinkState::Connected
                && !slot.suspected
                && now.duration_since(slot.last_seen) >= self.silence_timeout
            {
                warn!(peer = %peer, silent_for = ?now.duration_since(slot.last_seen), "peer went silent");
                slot.suspected = true;
                slot.sender().suspect_silent();
            }
            slot.sender().post(ApplicationMessage::ping());
        }
    }

    async fn shutdown(&mut self) {
        info!(room_id = %self.ctx.room_id, peers = self.links.len(), "closing host session");

        for poller in self.pollers.drain(..) {
            poller.cancel();
        }

        let handles: Vec<LinkHandle> = self.links.drain().map(|(_, slot)| slot.handle).collect();
        for handle in &handles {
            handle.close();
        }
        join_all(handles.into_iter().map(LinkHandle::shutdown)).await;

        if let Err(e) = self
            .ctx
            .signaling
            .close_room(&self.ctx.room_id, &self.ctx.local)
            .await
        {
            warn!(room_id = %self.ctx.room_id, "failed to close room on relay: {e}");
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
