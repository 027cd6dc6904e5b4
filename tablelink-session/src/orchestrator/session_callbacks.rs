use crate::error::SessionError;
use crate::orchestrator::SessionStatus;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tablelink_core::{ApplicationMessage, DeviceId, RestartReason};

/// Hooks the application registers with the orchestrator.
///
/// Every method has an empty default, so implementors only override what
/// they care about. Calls arrive one at a time, in the order the session
/// produced them.
#[async_trait]
pub trait SessionCallbacks: Send + Sync {
    async fn on_peer_connected(&self, _peer: &DeviceId, _info: Option<&Map<String, Value>>) {}

    async fn on_peer_disconnected(&self, _peer: &DeviceId) {}

    async fn on_message(&self, _peer: &DeviceId, _message: &ApplicationMessage) {}

    async fn on_error(&self, _peer: Option<&DeviceId>, _error: &SessionError) {}

    async fn on_restart_required(&self, _peer: &DeviceId, _reason: RestartReason, _attempt: u32) {
    }

    async fn on_status_changed(&self, _status: SessionStatus) {}
}

pub struct NoopCallbacks;

#[async_trait]
impl SessionCallbacks for NoopCallbacks {}
