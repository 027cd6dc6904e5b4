use crate::error::SessionResult;
use crate::transport::TransportEvent;
use async_trait::async_trait;
use std::time::Duration;
use tablelink_core::{DeviceId, IceCandidate, SignalKind};
use tokio::sync::mpsc;

/// One direct connection to a remote device, as seen by a `PeerLink`.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Opens the data channel. Only the offering side calls this.
    async fn create_data_channel(&self, label: &str) -> SessionResult<()>;

    /// Creates and applies a local offer, then waits for candidate gathering
    /// for at most `gather_timeout`. Returns the local description as it
    /// stands at that point.
    async fn create_offer(&self, gather_timeout: Duration) -> SessionResult<String>;

    /// Same as `create_offer`, for the answering side.
    async fn create_answer(&self, gather_timeout: Duration) -> SessionResult<String>;

    async fn set_remote_description(&self, kind: SignalKind, sdp: String) -> SessionResult<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()>;

    async fn send(&self, text: String) -> SessionResult<()>;

    async fn close(&self);
}

/// Builds transports. Each negotiation cycle gets a fresh one.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(
        &self,
        remote: &DeviceId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> SessionResult<Box<dyn PeerTransport>>;
}
