use crate::model::device::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Room code handed out by the relay.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room created by the host. `host_token` is the capability the relay issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub host_token: String,
    /// Unix millis, assigned locally when the relay confirmed the room.
    pub created_at: u64,
}

/// Relay answer to a join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRoom {
    pub token: String,
    pub host_id: DeviceId,
}

/// One entry of the relay's participant listing.
///
/// Older relays list bare device ids, newer ones return
/// `{device_id, role, last_seen}` objects; both decode into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ParticipantRepr")]
pub struct Participant {
    pub device_id: DeviceId,
    pub role: Option<String>,
    pub last_seen: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParticipantRepr {
    Listed {
        device_id: DeviceId,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        last_seen: Option<String>,
    },
    Bare(DeviceId),
}

impl From<ParticipantRepr> for Participant {
    fn from(repr: ParticipantRepr) -> Self {
        match repr {
            ParticipantRepr::Listed {
                device_id,
                role,
                last_seen,
            } => Self {
                device_id,
                role,
                last_seen,
            },
            ParticipantRepr::Bare(device_id) => Self {
                device_id,
                role: None,
                last_seen: None,
            },
        }
    }
}
