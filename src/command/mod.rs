//! Command execution infrastructure
//!
//! This module handles:
//! - The bounded queue between sessions and the device control loop
//! - Correlating each command with the response it produces
//! - Dispatching commands to the device handlers

pub mod bus;
mod executor;
pub mod handlers;
pub mod queue;

pub use bus::{BusError, CommandBus, Request};
pub use executor::{CommandExecutor, CommandResult, FollowUp};
