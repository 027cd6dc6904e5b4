mod link_command;
mod link_handle;
mod link_state;
mod peer_link;

pub use link_command::*;
pub use link_handle::*;
pub use link_state::*;
pub use peer_link::*;
