use crate::link::LinkState;
use crate::relay::RelayUpdate;
use tablelink_core::{ApplicationMessage, SignalEnvelope};
use tokio::sync::oneshot;

#[derive(Debug)]
pub(crate) enum GuestCommand {
    Relay(RelayUpdate),

    Route {
        envelope: SignalEnvelope,
        reply: oneshot::Sender<bool>,
    },

    Send {
        message: ApplicationMessage,
        reply: oneshot::Sender<bool>,
    },

    LinkState(oneshot::Sender<Option<LinkState>>),

    Close(oneshot::Sender<()>),
}

impl From<RelayUpdate> for GuestCommand {
    fn from(update: RelayUpdate) -> Self {
        Self::Relay(update)
    }
}
