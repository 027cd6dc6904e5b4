mod config;
mod error;
mod guest;
mod host;
mod identity;
mod link;
mod orchestrator;
mod polling;
mod relay;
mod transport;

pub use config::*;
pub use error::*;
pub use guest::*;
pub use host::*;
pub use identity::*;
pub use link::*;
pub use orchestrator::*;
pub use polling::*;
pub use relay::*;
pub use transport::*;
