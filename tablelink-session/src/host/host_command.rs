use crate::error::SessionResult;
use crate::orchestrator::PeerSummary;
use crate::relay::RelayUpdate;
use std::collections::BTreeMap;
use tablelink_core::{ApplicationMessage, DeviceId, RestartReason, SignalEnvelope};
use tokio::sync::oneshot;

/// Commands handled by the host session actor.
#[derive(Debug)]
pub(crate) enum HostCommand {
    Relay(RelayUpdate),

    /// Route one envelope by hand; `reply` learns whether a link took it.
    Route {
        envelope: SignalEnvelope,
        reply: oneshot::Sender<bool>,
    },

    SendTo {
        peer: DeviceId,
        message: ApplicationMessage,
        reply: oneshot::Sender<bool>,
    },

    Broadcast {
        message: ApplicationMessage,
        reply: oneshot::Sender<usize>,
    },

    Restart {
        peer: DeviceId,
        reason: RestartReason,
        reply: oneshot::Sender<SessionResult<()>>,
    },

    Peers(oneshot::Sender<BTreeMap<DeviceId, PeerSummary>>),

    Close(oneshot::Sender<()>),
}

impl From<RelayUpdate> for HostCommand {
    fn from(update: RelayUpdate) -> Self {
        Self::Relay(update)
    }
}
