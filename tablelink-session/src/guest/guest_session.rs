use crate::guest::GuestCommand;
use crate::link::{LinkContext, LinkEvent, LinkEventKind, LinkHandle, LinkState, PeerLink};
use crate::orchestrator::{SessionEvent, SessionStatus, StatusTracker};
use crate::polling::PollHandle;
use crate::relay::RelayUpdate;
use serde_json::{Map, Value};
use tablelink_core::{ApplicationMessage, DeviceId, MessageBody, SignalEnvelope, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct HostLink {
    handle: LinkHandle,
    state: LinkState,
    announced: bool,
}

impl HostLink {
    fn is_usable(&self) -> bool {
        !self.state.is_terminal() && self.handle.sender().is_alive()
    }
}

/// Actor driving the single link from a guest to the room's host.
pub(crate) struct GuestSession {
    ctx: LinkContext,
    host_id: DeviceId,
    hello: Map<String, Value>,
    link: Option<HostLink>,
    /// Host ice envelopes that arrived before any offer.
    early_candidates: Vec<SignalEnvelope>,
    pollers: Vec<PollHandle>,
    status: StatusTracker,
    events: mpsc::UnboundedSender<SessionEvent>,
    command_rx: mpsc::UnboundedReceiver<GuestCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl GuestSession {
    pub(crate) fn new(
        ctx: LinkContext,
        host_id: DeviceId,
        hello: Map<String, Value>,
        pollers: Vec<PollHandle>,
        command_rx: mpsc::UnboundedReceiver<GuestCommand>,
        link_rx: mpsc::UnboundedReceiver<LinkEvent>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            ctx,
            host_id,
            hello,
            link: None,
            early_candidates: Vec::new(),
            pollers,
            status: StatusTracker::new(SessionStatus::Connecting, events.clone()),
            events,
            command_rx,
            link_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(room_id = %self.ctx.room_id, host = %self.host_id, "guest session loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(GuestCommand::Close(reply)) => {
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
            }
        }

        info!(room_id = %self.ctx.room_id, "guest session loop finished");
    }

    fn handle_command(&mut self, cmd: GuestCommand) {
        match cmd {
            GuestCommand::Relay(RelayUpdate::Signals(batch)) => {
                self.status.relay_ok();
                for envelope in batch {
                    self.route_signal(envelope);
                }
            }
            GuestCommand::Relay(RelayUpdate::Participants(_) | RelayUpdate::Heartbeat) => {
                self.status.relay_ok();
            }
            GuestCommand::Relay(RelayUpdate::Failed(_)) => self.status.relay_failed(),

            GuestCommand::Route { envelope, reply } => {
                let _ = reply.send(self.route_signal(envelope));
            }

            GuestCommand::Send { message, reply } => {
                let Some(link) = self.link.as_ref().filter(|link| link.is_usable()) else {
                    let _ = reply.send(false);
                    return;
                };
                let sender = link.handle.sender().clone();
                tokio::spawn(async move {
                    let _ = reply.send(sender.send(message).await);
                });
            }

            GuestCommand::LinkState(reply) => {
                let _ = reply.send(self.link.as_ref().map(|link| link.state));
            }

            // Handled by the run loop.
            GuestCommand::Close(_) => {}
        }
    }

    fn route_signal(&mut self, envelope: SignalEnvelope) -> bool {
        if !envelope.is_addressed_to(&self.ctx.local) {
            debug!(from = %envelope.from, to = ?envelope.to, "signal for another device ignored");
            return false;
        }
        if envelope.from != self.host_id {
            warn!(from = %envelope.from, "signal from a device other than the host ignored");
            return false;
        }

        match envelope.kind {
            SignalKind::Offer => {
                if let Some(link) = self.link.as_ref().filter(|link| link.is_usable()) {
                    return link.handle.sender().signal(envelope);
                }
                if let Some(stale) = self.link.take() {
                    tokio::spawn(stale.handle.shutdown());
                }

                info!(host = %self.host_id, "offer received, answering");
                let early = std::mem::take(&mut self.early_candidates);
                let handle =
                    PeerLink::spawn_guest(self.ctx.clone(), self.host_id.clone(), envelope, early);
                self.link = Some(HostLink {
                    handle,
                    state: LinkState::Idle,
                    announced: false,
                });
                true
            }
            SignalKind::Ice => {
                if let Some(link) = self.link.as_ref().filter(|link| link.is_usable()) {
                    return link.handle.sender().signal(envelope);
                }
                if envelope.candidate().is_none() {
                    return false;
                }
                debug!(host = %self.host_id, "candidate before offer, buffering");
                self.early_candidates.push(envelope);
                true
            }
            SignalKind::Answer => {
                warn!(from = %envelope.from, "guest received an answer, ignored");
                false
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        let LinkEvent { peer, kind } = event;

        match kind {
            LinkEventKind::StateChanged(state) => self.on_link_state(peer, state),

            LinkEventKind::ChannelOpened => {
                if let Some(link) = &self.link {
                    link.handle
                        .sender()
                        .post(ApplicationMessage::hello(self.hello.clone()));
                }
            }

            LinkEventKind::Message(message) => {
                if let MessageBody::Ping = message.body {
                    if let Some(link) = &self.link {
                        link.handle.sender().post(ApplicationMessage::pong());
                    }
                    return;
                }
                self.emit(SessionEvent::Message { peer, message });
            }

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
        let Some(link) = self.link.as_mut() else {
            return;
        };
        link.state = state;

        match state {
            LinkState::Connected => {
                let announce = !link.announced;
                link.announced = true;
                self.status.set(SessionStatus::Connected);
                if announce {
                    self.emit(SessionEvent::PeerConnected { peer, info: None });
                }
            }
            LinkState::Failed | LinkState::Closed => {
                let announced = link.announced;
                if let Some(link) = self.link.take() {
                    tokio::spawn(link.handle.shutdown());
                }
                if state == LinkState::Failed {
                    warn!(host = %peer, "link to host failed");
                    self.status.set(SessionStatus::ConnectionLost);
                }
                if announced {
                    self.emit(SessionEvent::PeerDisconnected { peer });
                }
            }
            LinkState::Reconnecting => {
                let announced = std::mem::replace(&mut link.announced, false);
                self.status.set(SessionStatus::Reconnecting);
                if announced {
                    self.emit(SessionEvent::PeerDisconnected { peer });
                }
            }
            LinkState::Idle | LinkState::Negotiating | LinkState::Connecting => {}
        }
    }

    async fn shutdown(&mut self) {
        info!(room_id = %self.ctx.room_id, "closing guest session");

        for poller in self.pollers.drain(..) {
            poller.cancel();
        }
        if let Some(link) = self.link.take() {
            link.handle.shutdown().await;
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
