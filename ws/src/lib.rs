//! WatchStore - SQLite persistence for tracked torrent items
//!
//! One table, one row per watched tracker URL. The schema is versioned with
//! `PRAGMA user_version` and migrated forward on open.
//!
//! The store is synchronous and owns its connection; async callers wrap it in
//! an actor so that a single task talks to SQLite.

mod error;
mod record;
mod schema;
mod store;

pub use error::StoreError;
pub use record::{ItemRecord, NewItem};
pub use schema::SCHEMA_VERSION;
pub use store::ItemStore;

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
