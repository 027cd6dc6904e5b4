mod guest_command;
mod guest_session;
mod guest_session_manager;

pub(crate) use guest_command::*;
pub(crate) use guest_session::*;
pub use guest_session_manager::*;
