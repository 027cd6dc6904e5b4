mod host_command;
mod host_session;
mod host_session_manager;

pub(crate) use host_command::*;
pub(crate) use host_session::*;
pub use host_session_manager::*;
