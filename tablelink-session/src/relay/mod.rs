mod http_relay;
mod relay_poller;
mod signaling_transport;

pub use http_relay::*;
pub(crate) use relay_poller::*;
pub use signaling_transport::*;
