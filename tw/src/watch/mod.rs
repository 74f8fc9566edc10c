//! Per-item watchers and the supervisor that keeps them in sync with the store
//!
//! The [`Supervisor`] polls the store and drives the [`WatchRegistry`]:
//!
//! ```text
//!   NoWatcher ──interval>0──▶ Active(a) ──interval b──▶ Active(b)
//!                                 │                          │
//!                                 └──removed or interval 0───┴──▶ Cancelled
//! ```
//!
//! Each watcher is one tokio task that reconciles its item immediately and
//! then once per interval until its cancellation token fires.

mod registry;
mod supervisor;
mod worker;

pub use registry::WatchRegistry;
pub use supervisor::{Supervisor, SupervisorConfig, SyncReport};
pub use worker::spawn_worker;
