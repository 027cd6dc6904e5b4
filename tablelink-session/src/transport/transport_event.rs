use bytes::Bytes;
use tablelink_core::IceCandidate;

/// Events a `PeerTransport` reports to the link that owns it.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local network path was found and must reach the remote side.
    LocalCandidate(IceCandidate),

    /// The data channel is open and ready for writes.
    ChannelOpen,

    ChannelClosed,

    Message(Bytes),

    PathConnected,

    /// Transient loss; the path may still recover on its own.
    PathDisconnected,

    /// The path is gone for good.
    PathFailed,
}
