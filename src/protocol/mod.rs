//! Runner ↔ worker protocol
//!
//! JSON messages exchanged over a worker process's stdin and stdout.

mod messages;

pub use messages::*;
