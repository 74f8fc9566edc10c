//! Schema migrations

use rusqlite::Connection;
use tracing::{debug, info};

use crate::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 3;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &["CREATE TABLE IF NOT EXISTS tracked_items (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                title TEXT NOT NULL DEFAULT '',\
                name TEXT NOT NULL DEFAULT '',\
                hash TEXT NOT NULL DEFAULT '',\
                url TEXT NOT NULL\
            );"],
    },
    Migration {
        version: 2,
        statements: &["ALTER TABLE tracked_items ADD COLUMN watch_every INTEGER NOT NULL DEFAULT 0;"],
    },
    Migration {
        version: 3,
        statements: &[
            "ALTER TABLE tracked_items ADD COLUMN save_path TEXT NOT NULL DEFAULT '';",
            "ALTER TABLE tracked_items ADD COLUMN created_at INTEGER NOT NULL DEFAULT 0;",
            "ALTER TABLE tracked_items ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0;",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tracked_items_url ON tracked_items(url);",
        ],
    },
];

pub(crate) fn current_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Bring the database up to [`SCHEMA_VERSION`]
pub(crate) fn migrate(conn: &mut Connection) -> Result<()> {
    let found = current_version(conn)?;
    debug!(found, target = SCHEMA_VERSION, "migrate: called");

    if found > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
        let tx = conn.transaction()?;
        for statement in migration.statements {
            tx.execute_batch(statement)?;
        }
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        info!(version = migration.version, "Applied schema migration");
    }

    Ok(())
}
