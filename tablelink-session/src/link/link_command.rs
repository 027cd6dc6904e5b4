use crate::error::SessionError;
use crate::link::LinkState;
use tablelink_core::{ApplicationMessage, DeviceId, RestartReason, SignalEnvelope};
use tokio::sync::oneshot;

/// Commands queued to a running `PeerLink`.
#[derive(Debug)]
pub enum LinkCommand {
    /// Envelope pulled from the mailbox for this link.
    Signal(SignalEnvelope),

    /// Application message for the data channel. `reply` learns whether it went out.
    Send {
        message: ApplicationMessage,
        reply: Option<oneshot::Sender<bool>>,
    },

    /// Renegotiate now. Ignored by guest links.
    Restart(RestartReason),

    /// The owner heard nothing from the peer for too long.
    SuspectSilent,

    Close,
}

#[derive(Debug, Clone)]
pub struct LinkEvent {
    pub peer: DeviceId,
    pub kind: LinkEventKind,
}

#[derive(Debug, Clone)]
pub enum LinkEventKind {
    StateChanged(LinkState),
    /// A fresh data channel opened. Reported once per negotiation cycle.
    ChannelOpened,
    Message(ApplicationMessage),
    RestartRequired { reason: RestartReason, attempt: u32 },
    Error(SessionError),
}
