mod backoff;
mod polling_loop;

pub use backoff::*;
pub use polling_loop::*;
