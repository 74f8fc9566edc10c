//! ItemStore - CRUD over the tracked_items table

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::record::{ItemRecord, NewItem};
use crate::{Result, schema};

const SELECT_COLUMNS: &str = "id, url, title, name, hash, save_path, watch_every, created_at, updated_at";

/// Synchronous SQLite store for tracked items
pub struct ItemStore {
    conn: Connection,
}

impl ItemStore {
    /// Open (or create) the database file and migrate it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "ItemStore::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "ItemStore opened");
        Ok(store)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        debug!("ItemStore::open_in_memory: called");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// All items, oldest first
    pub fn list(&self) -> Result<Vec<ItemRecord>> {
        debug!("ItemStore::list: called");
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tracked_items ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_record)?;
        let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = items.len(), "ItemStore::list: loaded");
        Ok(items)
    }

    pub fn get(&self, id: i64) -> Result<Option<ItemRecord>> {
        debug!(id, "ItemStore::get: called");
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tracked_items WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], row_to_record).optional()?)
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<ItemRecord>> {
        debug!(%url, "ItemStore::get_by_url: called");
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tracked_items WHERE url = ?1");
        Ok(self.conn.query_row(&sql, params![url], row_to_record).optional()?)
    }

    /// Insert a new row, or refresh title/name/hash/save_path of the row with
    /// the same URL. The watch interval of an existing row is left alone.
    pub fn upsert(&self, item: &NewItem) -> Result<ItemRecord> {
        debug!(url = %item.url, hash = %item.hash, "ItemStore::upsert: called");
        let now = now_secs();
        self.conn.execute(
            "INSERT INTO tracked_items (url, title, name, hash, save_path, watch_every, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             ON CONFLICT(url) DO UPDATE SET \
                title = excluded.title, \
                name = excluded.name, \
                hash = excluded.hash, \
                save_path = excluded.save_path, \
                updated_at = excluded.updated_at",
            params![item.url, item.title, item.name, item.hash, item.save_path, item.watch_every, now],
        )?;
        // The row exists now; a miss here means a concurrent delete on another connection
        self.get_by_url(&item.url)?
            .ok_or(crate::StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Overwrite the mutable fields of an existing row. Returns false when the
    /// id is gone; never inserts. `watch_every` is not touched.
    pub fn update(&self, item: &ItemRecord) -> Result<bool> {
        debug!(id = item.id, hash = %item.hash, "ItemStore::update: called");
        let changed = self.conn.execute(
            "UPDATE tracked_items SET url = ?2, title = ?3, name = ?4, hash = ?5, save_path = ?6, updated_at = ?7 \
             WHERE id = ?1",
            params![item.id, item.url, item.title, item.name, item.hash, item.save_path, now_secs()],
        )?;
        Ok(changed > 0)
    }

    /// Returns false when no row had that id
    pub fn delete(&self, id: i64) -> Result<bool> {
        debug!(id, "ItemStore::delete: called");
        let changed = self.conn.execute("DELETE FROM tracked_items WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Returns false when no row had that id
    pub fn set_watch_every(&self, id: i64, minutes: u32) -> Result<bool> {
        debug!(id, minutes, "ItemStore::set_watch_every: called");
        let changed = self.conn.execute(
            "UPDATE tracked_items SET watch_every = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, minutes, now_secs()],
        )?;
        Ok(changed > 0)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ItemRecord> {
    Ok(ItemRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        name: row.get(3)?,
        hash: row.get(4)?,
        save_path: row.get(5)?,
        watch_every: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_item(url: &str, hash: &str) -> NewItem {
        NewItem {
            url: url.to_string(),
            title: "Some Show S01".to_string(),
            name: "Some.Show.S01".to_string(),
            hash: hash.to_string(),
            save_path: "/downloads".to_string(),
            watch_every: 0,
        }
    }

    #[test]
    fn test_open_creates_file_and_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("items.db");
        let _store = ItemStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let store = ItemStore::open_in_memory().unwrap();
        let first = store.upsert(&new_item("https://kinozal.tv/details.php?id=1", "aaa")).unwrap();
        assert_eq!(first.hash, "aaa");

        let second = store.upsert(&new_item("https://kinozal.tv/details.php?id=1", "bbb")).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.hash, "bbb");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_preserves_watch_interval() {
        let store = ItemStore::open_in_memory().unwrap();
        let item = store.upsert(&new_item("https://rutracker.org/forum/viewtopic.php?t=5", "aaa")).unwrap();
        assert!(store.set_watch_every(item.id, 30).unwrap());

        let mut again = new_item("https://rutracker.org/forum/viewtopic.php?t=5", "aaa");
        again.watch_every = 0;
        let refreshed = store.upsert(&again).unwrap();
        assert_eq!(refreshed.watch_every, 30);
    }

    #[test]
    fn test_update_does_not_resurrect_deleted_row() {
        let store = ItemStore::open_in_memory().unwrap();
        let mut item = store.upsert(&new_item("https://kinozal.tv/details.php?id=2", "aaa")).unwrap();
        assert!(store.delete(item.id).unwrap());

        item.hash = "bbb".to_string();
        assert!(!store.update(&item).unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_leaves_watch_interval() {
        let store = ItemStore::open_in_memory().unwrap();
        let mut item = store.upsert(&new_item("https://kinozal.tv/details.php?id=3", "aaa")).unwrap();
        store.set_watch_every(item.id, 15).unwrap();

        item.hash = "ccc".to_string();
        item.watch_every = 0;
        assert!(store.update(&item).unwrap());

        let stored = store.get(item.id).unwrap().unwrap();
        assert_eq!(stored.hash, "ccc");
        assert_eq!(stored.watch_every, 15);
    }

    #[test]
    fn test_missing_ids() {
        let store = ItemStore::open_in_memory().unwrap();
        assert!(store.get(42).unwrap().is_none());
        assert!(!store.delete(42).unwrap());
        assert!(!store.set_watch_every(42, 5).unwrap());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("items.db");
        {
            let store = ItemStore::open(&path).unwrap();
            store.upsert(&new_item("https://kinozal.tv/details.php?id=9", "abc")).unwrap();
        }
        let store = ItemStore::open(&path).unwrap();
        let items = store.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].hash, "abc");
    }
}
