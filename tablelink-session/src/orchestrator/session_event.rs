use crate::error::SessionError;
use crate::orchestrator::SessionStatus;
use serde_json::{Map, Value};
use tablelink_core::{ApplicationMessage, DeviceId, RestartReason};
use tokio::sync::mpsc;

/// Everything a session manager reports to the orchestrator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PeerConnected {
        peer: DeviceId,
        info: Option<Map<String, Value>>,
    },
    PeerDisconnected {
        peer: DeviceId,
    },
    Message {
        peer: DeviceId,
        message: ApplicationMessage,
    },
    Error {
        peer: Option<DeviceId>,
        error: SessionError,
    },
    RestartRequired {
        peer: DeviceId,
        reason: RestartReason,
        attempt: u32,
    },
    StatusChanged(SessionStatus),
}

/// Tracks the session status, folding relay health into it, and reports
/// every effective change.
pub(crate) struct StatusTracker {
    base: SessionStatus,
    relay_degraded: bool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl StatusTracker {
    pub(crate) fn new(initial: SessionStatus, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        let _ = events.send(SessionEvent::StatusChanged(initial));
        Self {
            base: initial,
            relay_degraded: false,
            events,
        }
    }

    pub(crate) fn current(&self) -> SessionStatus {
        match self.base {
            SessionStatus::Connecting | SessionStatus::Connected if self.relay_degraded => {
                SessionStatus::Reconnecting
            }
            base => base,
        }
    }

    pub(crate) fn set(&mut self, status: SessionStatus) {
        self.update(|tracker| tracker.base = status);
    }

    pub(crate) fn relay_failed(&mut self) {
        self.update(|tracker| tracker.relay_degraded = true);
    }

    pub(crate) fn relay_ok(&mut self) {
        self.update(|tracker| tracker.relay_degraded = false);
    }

    fn update(&mut self, change: impl FnOnce(&mut Self)) {
        let before = self.current();
        change(self);
        let after = self.current();
        if before != after {
            let _ = self.events.send(SessionEvent::StatusChanged(after));
        }
    }
}
