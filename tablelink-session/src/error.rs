use tablelink_core::{DeviceId, RoomId};

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Relay unreachable (`status == None`) or answered with a non-2xx status.
    #[error("relay request failed ({}): {message}", describe_status(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("channel failure: {0}")]
    Channel(String),

    #[error("peer {peer} gave up after {attempts} restart attempts")]
    RestartExhausted { peer: DeviceId, attempts: u32 },

    #[error("room {0} does not exist or is closed")]
    InviteNotFound(RoomId),

    #[error("unknown peer {0}")]
    PeerNotFound(DeviceId),

    #[error("session is closed")]
    Closed,
}

fn describe_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_owned(), |s| format!("HTTP {s}"))
}

impl SessionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn negotiation(err: impl std::fmt::Display) -> Self {
        Self::Negotiation(format!("{err:#}"))
    }

    pub(crate) fn channel(err: impl std::fmt::Display) -> Self {
        Self::Channel(format!("{err:#}"))
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
