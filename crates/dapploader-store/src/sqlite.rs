//! SQLite backend.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::kv::PersistentKv;
use crate::{now_rfc3339, StoreResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    written_at TEXT NOT NULL
)";

pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PersistentKv for SqliteKv {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO kv (key, value, written_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, written_at = excluded.written_at",
            params![key, value, now_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn.lock().execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn clear(&self) -> StoreResult<()> {
        self.conn.lock().execute("DELETE FROM kv", [])?;
        Ok(())
    }

    fn size_bytes(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM kv",
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }
}
