use crate::config::LinkConfig;
use crate::error::{SessionError, SessionResult};
use crate::link::{
    LinkCommand, LinkEvent, LinkEventKind, LinkHandle, LinkRole, LinkSender, LinkState,
};
use crate::relay::SignalingTransport;
use crate::transport::{PeerTransport, TransportEvent, TransportFactory};
use std::cmp::Ordering as CycleOrder;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tablelink_core::{
    ApplicationMessage, DeviceId, IceCandidate, RestartReason, RoomId, SignalEnvelope, SignalKind,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Everything a link needs from its owning manager.
#[derive(Clone)]
pub struct LinkContext {
    pub local: DeviceId,
    pub room_id: RoomId,
    pub config: LinkConfig,
    pub signaling: Arc<dyn SignalingTransport>,
    pub factory: Arc<dyn TransportFactory>,
    pub events: mpsc::UnboundedSender<LinkEvent>,
}

enum Start {
    Offer,
    Answer {
        offer: SignalEnvelope,
        early: Vec<SignalEnvelope>,
    },
}

/// Remote candidate waiting for the description of its negotiation cycle.
struct PendingCandidate {
    generation: Option<u32>,
    candidate: IceCandidate,
}

/// Negotiation state machine for one direct connection.
///
/// Runs as its own task; everything that touches the transport is serialized
/// through the loop in [`PeerLink::run`]. Candidates that show up before the
/// remote description are queued and applied in arrival order right after it.
///
/// Every offer, answer and candidate is tagged with the generation of the
/// negotiation cycle that produced it. A candidate tagged for a later cycle
/// waits in the queue until that cycle's description is applied; one from an
/// earlier cycle is dropped. Untagged signals always count as current.
pub struct PeerLink {
    role: LinkRole,
    remote: DeviceId,
    ctx: LinkContext,
    state: LinkState,
    generation: Option<u32>,
    has_remote_description: bool,
    pending_candidates: Vec<PendingCandidate>,
    restart_attempts: u32,
    channel_ready: bool,
    grace_deadline: Option<Instant>,
    connect_deadline: Option<Instant>,
    pending_restart: Option<RestartReason>,
    alive: Arc<AtomicBool>,
    transport: Option<Box<dyn PeerTransport>>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    command_rx: mpsc::UnboundedReceiver<LinkCommand>,
}

impl PeerLink {
    /// Starts a host-role link that offers to `remote` right away.
    pub fn spawn_host(ctx: LinkContext, remote: DeviceId) -> LinkHandle {
        Self::spawn(ctx, LinkRole::Host, remote, Start::Offer)
    }

    /// Starts a guest-role link from the host's offer. `early` holds the ice
    /// envelopes that arrived before the offer did.
    pub fn spawn_guest(
        ctx: LinkContext,
        remote: DeviceId,
        offer: SignalEnvelope,
        early: Vec<SignalEnvelope>,
    ) -> LinkHandle {
        Self::spawn(ctx, LinkRole::Guest, remote, Start::Answer { offer, early })
    }

    fn spawn(ctx: LinkContext, role: LinkRole, remote: DeviceId, start: Start) -> LinkHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));

        let link = Self {
            role,
            remote: remote.clone(),
            ctx,
            state: LinkState::Idle,
            generation: None,
            has_remote_description: false,
            pending_candidates: Vec::new(),
            restart_attempts: 0,
            channel_ready: false,
            grace_deadline: None,
            connect_deadline: None,
            pending_restart: None,
            alive: alive.clone(),
            transport: None,
            transport_rx: detached_events(),
            command_rx,
        };
        let task = tokio::spawn(link.run(start));

        LinkHandle::new(LinkSender::new(remote, command_tx, alive), task)
    }

    async fn run(mut self, start: Start) {
        info!(peer = %self.remote, role = ?self.role, "peer link started");

        let outcome = match start {
            Start::Offer => self.begin_offer(None).await,
            Start::Answer { offer, early } => {
                for envelope in early {
                    self.queue_candidate(&envelope);
                }
                self.accept_offer(offer).await
            }
        };
        self.absorb(outcome);

        while self.is_alive() && !self.state.is_terminal() {
            if let Some(reason) = self.pending_restart.take() {
                self.restart(reason).await;
                continue;
            }

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(LinkCommand::Close) | None => break,
                        Some(c) => self.handle_command(c).await,
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }

                _ = sleep_until_opt(self.grace_deadline) => {
                    self.grace_deadline = None;
                    info!(peer = %self.remote, "grace period elapsed without recovery");
                    self.pending_restart = Some(RestartReason::GraceTimeout);
                }

                _ = sleep_until_opt(self.connect_deadline) => {
                    self.connect_deadline = None;
                    warn!(peer = %self.remote, state = %self.state, "connection attempt timed out");
                    self.pending_restart = Some(RestartReason::IceFailed);
                }
            }
        }

        self.teardown().await;
    }

    async fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::Signal(envelope) => self.handle_signal(envelope).await,

            LinkCommand::Send { message, reply } => {
                let sent = self.send_message(&message).await;
                if let Some(reply) = reply {
                    let _ = reply.send(sent);
                }
            }

            LinkCommand::Restart(reason) => match self.role {
                LinkRole::Host => self.pending_restart = Some(reason),
                LinkRole::Guest => debug!(peer = %self.remote, "guest links do not initiate restarts"),
            },

            LinkCommand::SuspectSilent => self.enter_grace(),

            // Handled by the run loop.
            LinkCommand::Close => {}
        }
    }

    async fn handle_signal(&mut self, envelope: SignalEnvelope) {
        match (envelope.kind, self.role) {
            (SignalKind::Offer, LinkRole::Guest) => {
                let outcome = self.accept_offer(envelope).await;
                self.absorb(outcome);
            }
            (SignalKind::Answer, LinkRole::Host) => {
                let outcome = self.accept_answer(envelope).await;
                self.absorb(outcome);
            }
            (SignalKind::Ice, _) => match self.cycle_of(envelope.generation()) {
                CycleOrder::Less => {
                    debug!(peer = %self.remote, generation = ?envelope.generation(), "candidate from an old cycle dropped");
                }
                CycleOrder::Equal if self.has_remote_description => {
                    if let Some(candidate) = envelope.candidate().cloned() {
                        self.apply_candidate(candidate).await;
                    } else {
                        warn!(peer = %self.remote, "ice envelope without candidate");
                    }
                }
                CycleOrder::Equal | CycleOrder::Greater => self.queue_candidate(&envelope),
            },
            (kind, role) => {
                warn!(peer = %self.remote, ?kind, ?role, "signal not valid for this role, ignored");
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::LocalCandidate(candidate) => {
                let envelope = self.tag(SignalEnvelope::ice(
                    self.ctx.local.clone(),
                    self.remote.clone(),
                    candidate,
                ));
                if let Err(e) = self.push(envelope).await {
                    warn!(peer = %self.remote, "failed to push local candidate: {e}");
                }
            }

            TransportEvent::ChannelOpen => {
                if !self.has_remote_description {
                    warn!(peer = %self.remote, "channel opened before remote description, ignored");
                    return;
                }
                info!(peer = %self.remote, "data channel open");
                self.channel_ready = true;
                self.restart_attempts = 0;
                self.connect_deadline = None;
                self.grace_deadline = None;
                self.emit(LinkEventKind::ChannelOpened);
                self.set_state(LinkState::Connected);
            }

            TransportEvent::ChannelClosed => {
                self.channel_ready = false;
                if matches!(
                    self.state,
                    LinkState::Connecting | LinkState::Connected | LinkState::Reconnecting
                ) {
                    info!(peer = %self.remote, "data channel closed");
                    self.pending_restart = Some(RestartReason::IceFailed);
                }
            }

            TransportEvent::Message(data) => {
                self.recover();
                match ApplicationMessage::decode(&data) {
                    Ok(message) => self.emit(LinkEventKind::Message(message)),
                    Err(e) => warn!(peer = %self.remote, "dropping undecodable message: {e}"),
                }
            }

            TransportEvent::PathConnected => self.recover(),

            TransportEvent::PathDisconnected => self.enter_grace(),

            TransportEvent::PathFailed => {
                warn!(peer = %self.remote, "network path failed");
                self.pending_restart = Some(RestartReason::IceFailed);
            }
        }
    }

    async fn begin_offer(&mut self, reason: Option<RestartReason>) -> SessionResult<()> {
        self.start_cycle(false).await;
        self.generation = Some(self.generation.map_or(1, |g| g + 1));
        self.set_state(LinkState::Negotiating);
        self.open_transport().await?;

        let sdp = {
            let transport = self.transport()?;
            transport
                .create_data_channel(&self.ctx.config.channel_label)
                .await?;
            transport
                .create_offer(self.ctx.config.discovery_timeout)
                .await?
        };

        let offer = self.tag(SignalEnvelope::offer(
            self.ctx.local.clone(),
            self.remote.clone(),
            sdp,
            reason,
        ));
        debug!(peer = %self.remote, ?reason, generation = ?self.generation, "sending offer");
        self.push(offer).await
    }

    async fn accept_offer(&mut self, offer: SignalEnvelope) -> SessionResult<()> {
        let sdp = offer
            .sdp()
            .ok_or_else(|| SessionError::Negotiation("offer without sdp".to_owned()))?
            .to_owned();
        if let Some(reason) = offer.restart_reason() {
            info!(peer = %self.remote, %reason, "host restarted negotiation");
        }

        self.start_cycle(true).await;
        self.generation = offer.generation();
        self.set_state(LinkState::Negotiating);
        self.open_transport().await?;

        let answer = {
            let transport = self.transport()?;
            transport
                .set_remote_description(SignalKind::Offer, sdp)
                .await?;
            transport
                .create_answer(self.ctx.config.discovery_timeout)
                .await?
        };
        self.ensure_alive()?;

        let envelope = self.tag(SignalEnvelope::answer(
            self.ctx.local.clone(),
            self.remote.clone(),
            answer,
        ));
        let pushed = self.push(envelope).await;

        self.has_remote_description = true;
        self.drain_pending().await;
        self.set_state(LinkState::Connecting);
        pushed
    }

    async fn accept_answer(&mut self, answer: SignalEnvelope) -> SessionResult<()> {
        if self.has_remote_description {
            debug!(peer = %self.remote, "duplicate answer ignored");
            return Ok(());
        }
        if self.state != LinkState::Negotiating {
            debug!(peer = %self.remote, state = %self.state, "answer without pending offer ignored");
            return Ok(());
        }
        if self.cycle_of(answer.generation()) != CycleOrder::Equal {
            debug!(peer = %self.remote, generation = ?answer.generation(), "answer to another offer ignored");
            return Ok(());
        }
        let sdp = answer
            .sdp()
            .ok_or_else(|| SessionError::Negotiation("answer without sdp".to_owned()))?
            .to_owned();

        self.transport()?
            .set_remote_description(SignalKind::Answer, sdp)
            .await?;
        self.ensure_alive()?;

        self.has_remote_description = true;
        self.drain_pending().await;
        self.set_state(LinkState::Connecting);
        Ok(())
    }

    async fn restart(&mut self, reason: RestartReason) {
        let cap = self.ctx.config.restart_cap;
        if self.restart_attempts >= cap {
            warn!(peer = %self.remote, attempts = self.restart_attempts, "restart budget exhausted");
            self.close_transport().await;
            self.emit(LinkEventKind::Error(SessionError::RestartExhausted {
                peer: self.remote.clone(),
                attempts: self.restart_attempts,
            }));
            self.set_state(LinkState::Failed);
            return;
        }

        self.restart_attempts += 1;
        info!(peer = %self.remote, %reason, attempt = self.restart_attempts, "restarting negotiation");
        self.emit(LinkEventKind::RestartRequired {
            reason,
            attempt: self.restart_attempts,
        });
        self.set_state(LinkState::Reconnecting);

        match self.role {
            LinkRole::Host => {
                let outcome = self.begin_offer(Some(reason)).await;
                self.absorb(outcome);
            }
            LinkRole::Guest => {
                // Wait for the host's restart offer.
                self.start_cycle(true).await;
            }
        }
    }

    /// Resets per-negotiation state. Queued candidates survive only when the
    /// next remote description has not been seen yet (guest side); the drain
    /// after that description sorts them by cycle.
    async fn start_cycle(&mut self, keep_pending: bool) {
        self.close_transport().await;
        self.has_remote_description = false;
        if !keep_pending {
            self.pending_candidates.clear();
        }
        self.channel_ready = false;
        self.grace_deadline = None;
        self.connect_deadline = Some(Instant::now() + self.ctx.config.connect_timeout);
    }

    async fn open_transport(&mut self) -> SessionResult<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = self.ctx.factory.connect(&self.remote, events_tx).await?;

        if !self.is_alive() {
            transport.close().await;
            return Err(SessionError::Closed);
        }

        self.transport = Some(transport);
        self.transport_rx = events_rx;
        Ok(())
    }

    async fn close_transport(&mut self) {
        self.transport_rx = detached_events();
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
    }

    fn transport(&self) -> SessionResult<&dyn PeerTransport> {
        self.transport.as_deref().ok_or(SessionError::Closed)
    }

    /// Applies the queued candidates of the current cycle in arrival order.
    /// Candidates of a later cycle stay queued, older ones are dropped.
    async fn drain_pending(&mut self) {
        let queued = std::mem::take(&mut self.pending_candidates);
        if queued.is_empty() {
            return;
        }
        debug!(peer = %self.remote, count = queued.len(), "applying queued candidates");
        for pending in queued {
            match self.cycle_of(pending.generation) {
                CycleOrder::Equal => self.apply_candidate(pending.candidate).await,
                CycleOrder::Greater => self.pending_candidates.push(pending),
                CycleOrder::Less => {}
            }
        }
    }

    fn queue_candidate(&mut self, envelope: &SignalEnvelope) {
        let Some(candidate) = envelope.candidate().cloned() else {
            warn!(peer = %self.remote, "ice envelope without candidate");
            return;
        };
        self.pending_candidates.push(PendingCandidate {
            generation: envelope.generation(),
            candidate,
        });
    }

    /// Where a signal tagged `generation` sits relative to the current cycle.
    fn cycle_of(&self, generation: Option<u32>) -> CycleOrder {
        match (generation, self.generation) {
            (Some(theirs), Some(ours)) => theirs.cmp(&ours),
            _ => CycleOrder::Equal,
        }
    }

    fn tag(&self, envelope: SignalEnvelope) -> SignalEnvelope {
        match self.generation {
            Some(generation) => envelope.with_generation(generation),
            None => envelope,
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            warn!(peer = %self.remote, "failed to add remote candidate: {e}");
        }
    }

    async fn send_message(&mut self, message: &ApplicationMessage) -> bool {
        if !self.channel_ready {
            return false;
        }
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(peer = %self.remote, "failed to encode {} message: {e}", message.kind());
                return false;
            }
        };
        let Some(transport) = self.transport.as_deref() else {
            return false;
        };

        match transport.send(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %self.remote, "send failed: {e}");
                self.emit(LinkEventKind::Error(e));
                self.enter_grace();
                false
            }
        }
    }

    /// Starts the grace timer for a connected link that may be dropping. The
    /// link stays CONNECTED until the timer fires.
    fn enter_grace(&mut self) {
        if self.state != LinkState::Connected || self.grace_deadline.is_some() {
            return;
        }
        info!(peer = %self.remote, "link degraded, waiting for recovery");
        self.grace_deadline = Some(Instant::now() + self.ctx.config.grace_period);
    }

    fn recover(&mut self) {
        if self.grace_deadline.take().is_some() {
            info!(peer = %self.remote, "link recovered within grace period");
        }
    }

    /// Routes the outcome of a negotiation step. Relay failures are left to
    /// the connect deadline; anything else costs a restart attempt.
    fn absorb(&mut self, outcome: SessionResult<()>) {
        match outcome {
            Ok(()) | Err(SessionError::Closed) => {}
            Err(e @ SessionError::Transport { .. }) => {
                warn!(peer = %self.remote, "relay rejected signal: {e}");
            }
            Err(e) => {
                warn!(peer = %self.remote, "negotiation step failed: {e}");
                self.emit(LinkEventKind::Error(e));
                self.pending_restart = Some(RestartReason::IceFailed);
            }
        }
    }

    async fn push(&self, envelope: SignalEnvelope) -> SessionResult<()> {
        self.ensure_alive()?;
        self.ctx
            .signaling
            .push_signal(&self.ctx.room_id, &envelope)
            .await
    }

    async fn teardown(&mut self) {
        self.grace_deadline = None;
        self.connect_deadline = None;
        self.close_transport().await;
        if self.state != LinkState::Failed {
            self.set_state(LinkState::Closed);
        }
        info!(peer = %self.remote, state = %self.state, "peer link stopped");
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }
        debug!(peer = %self.remote, from = %self.state, to = %state, "link state changed");
        self.state = state;
        self.emit(LinkEventKind::StateChanged(state));
    }

    fn emit(&self, kind: LinkEventKind) {
        if !self.is_alive() {
            return;
        }
        let _ = self.ctx.events.send(LinkEvent {
            peer: self.remote.clone(),
            kind,
        });
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> SessionResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }
}

/// Receiver whose sender is already gone. Stands in between negotiation
/// cycles so stale transport events have nowhere to land.
fn detached_events() -> mpsc::UnboundedReceiver<TransportEvent> {
    let (_, rx) = mpsc::unbounded_channel();
    rx
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
