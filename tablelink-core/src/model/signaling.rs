use crate::model::device::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

/// Why an offer restarts an already negotiated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartReason {
    Manual,
    IceFailed,
    GraceTimeout,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Manual => "manual",
            Self::IceFailed => "ice-failed",
            Self::GraceTimeout => "grace-timeout",
        };
        f.write_str(s)
    }
}

/// Network path descriptor in the JSON shape browsers produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CandidateRepr")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(rename = "usernameFragment", skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

// Some peers send only the raw `candidate:...` line.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateRepr {
    Structured {
        candidate: String,
        #[serde(rename = "sdpMid", default)]
        sdp_mid: Option<String>,
        #[serde(rename = "sdpMLineIndex", default)]
        sdp_m_line_index: Option<u16>,
        #[serde(rename = "usernameFragment", default)]
        username_fragment: Option<String>,
    },
    Line(String),
}

impl From<CandidateRepr> for IceCandidate {
    fn from(repr: CandidateRepr) -> Self {
        match repr {
            CandidateRepr::Structured {
                candidate,
                sdp_mid,
                sdp_m_line_index,
                username_fragment,
            } => Self {
                candidate,
                sdp_mid,
                sdp_m_line_index,
                username_fragment,
            },
            CandidateRepr::Line(candidate) => Self::new(candidate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalPayload {
    Description {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<RestartReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generation: Option<u32>,
    },
    Candidate {
        candidate: IceCandidate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generation: Option<u32>,
    },
}

/// One message in the relay mailbox.
///
/// The relay strips `to` when delivering, so it is optional on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub from: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DeviceId>,
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn offer(
        from: DeviceId,
        to: DeviceId,
        sdp: String,
        reason: Option<RestartReason>,
    ) -> Self {
        Self {
            kind: SignalKind::Offer,
            from,
            to: Some(to),
            payload: SignalPayload::Description {
                sdp,
                reason,
                generation: None,
            },
        }
    }

    pub fn answer(from: DeviceId, to: DeviceId, sdp: String) -> Self {
        Self {
            kind: SignalKind::Answer,
            from,
            to: Some(to),
            payload: SignalPayload::Description {
                sdp,
                reason: None,
                generation: None,
            },
        }
    }

    pub fn ice(from: DeviceId, to: DeviceId, candidate: IceCandidate) -> Self {
        Self {
            kind: SignalKind::Ice,
            from,
            to: Some(to),
            payload: SignalPayload::Candidate {
                candidate,
                generation: None,
            },
        }
    }

    /// Tags the envelope with the negotiation cycle it belongs to. Offers,
    /// answers and candidates of one cycle carry the same number.
    pub fn with_generation(mut self, generation: u32) -> Self {
        match &mut self.payload {
            SignalPayload::Description { generation: g, .. }
            | SignalPayload::Candidate { generation: g, .. } => *g = Some(generation),
        }
        self
    }

    pub fn generation(&self) -> Option<u32> {
        match &self.payload {
            SignalPayload::Description { generation, .. }
            | SignalPayload::Candidate { generation, .. } => *generation,
        }
    }

    /// True unless the envelope names a different recipient.
    pub fn is_addressed_to(&self, device: &DeviceId) -> bool {
        self.to.as_ref().is_none_or(|to| to == device)
    }

    pub fn sdp(&self) -> Option<&str> {
        match &self.payload {
            SignalPayload::Description { sdp, .. } => Some(sdp),
            SignalPayload::Candidate { .. } => None,
        }
    }

    pub fn candidate(&self) -> Option<&IceCandidate> {
        match &self.payload {
            SignalPayload::Candidate { candidate, .. } => Some(candidate),
            SignalPayload::Description { .. } => None,
        }
    }

    pub fn restart_reason(&self) -> Option<RestartReason> {
        match &self.payload {
            SignalPayload::Description { reason, .. } => *reason,
            SignalPayload::Candidate { .. } => None,
        }
    }
}
