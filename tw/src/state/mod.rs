//! State management with actor pattern
//!
//! StateManager owns the SQLite ItemStore on a blocking task and serves
//! requests over a channel, giving async callers shared access to it.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
