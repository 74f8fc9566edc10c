//! Live status feed
//!
//! Reconciliation results are published on an [`EventBus`]
//! (`tokio::sync::broadcast`). The [`StatusFeed`] also remembers the last
//! check result per item, so a new subscriber gets a full snapshot followed
//! by deltas.
//!
//! ```text
//!   Reconciler ──emit──▶ EventBus ──▶ IPC followers
//!        │                   ▲
//!        └─record_check──▶ StatusFeed (last status per item)
//! ```

mod bus;
mod feed;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use feed::StatusFeed;
pub use types::WatchEvent;
