use crate::link::LinkState;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tablelink_core::{DeviceId, RoomId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Host,
    Guest,
}

/// User-facing condition of the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Connecting,
    Connected,
    /// The relay or the link is misbehaving and recovery is underway.
    Reconnecting,
    /// Restarts ran out. Only a fresh session gets out of this.
    ConnectionLost,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::ConnectionLost => "connection lost",
            Self::Ended => "ended",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerSummary {
    pub device_id: DeviceId,
    pub link_state: LinkState,
    /// What the guest sent in its `hello`.
    pub info: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub role: SessionRole,
    pub status: SessionStatus,
    pub room_id: RoomId,
    /// Guests only: the device hosting the room.
    pub host_id: Option<DeviceId>,
    /// Hosts only: one entry per known guest.
    pub peers: BTreeMap<DeviceId, PeerSummary>,
}
