//! Operator sessions
//!
//! One operator at a time talks to the server over a line-based TCP
//! protocol. The listener turns away extra connections; the handler relays
//! each command to the device control loop and reports its response.

mod handler;
mod listener;

pub use listener::Listener;
