mod session_callbacks;
mod session_event;
mod session_orchestrator;
mod session_state;

pub use session_callbacks::*;
pub use session_event::*;
pub use session_orchestrator::*;
pub use session_state::*;
