use thiserror::Error;

/// Errors raised by [`crate::ItemStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
}
