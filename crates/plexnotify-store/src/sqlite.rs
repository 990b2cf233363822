//! SQLite-backed status store with run leases.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plexnotify_core::error::{PlexNotifyError, Result};
use plexnotify_core::traits::StateStore;
use plexnotify_core::types::StatusEntry;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::lease_expiry;

fn store_err(e: impl std::fmt::Display) -> PlexNotifyError {
    PlexNotifyError::Store(e.to_string())
}

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open or create the store database, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::with_connection(conn)
    }

    /// Open an existing store without write access. Nothing is created on
    /// disk: a missing file yields an empty in-memory store instead.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No store at {}, using an empty one", path.display());
            return Self::open_in_memory();
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute_batch(
            "
            -- Last observed status per identity key
            CREATE TABLE IF NOT EXISTS request_status (
                key TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Run leases (one row per lease name)
            CREATE TABLE IF NOT EXISTS run_leases (
                name TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL      -- unix millis
            );
            ",
        )
        .map_err(|e| PlexNotifyError::Store(format!("Migration: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT status FROM request_status WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    async fn put(&self, key: &str, status: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO request_status (key, status, first_seen, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(key) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
            rusqlite::params![key, status, now],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<StatusEntry>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare("SELECT key, status, updated_at FROM request_status ORDER BY key")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(store_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, status, updated_at) = row.map_err(store_err)?;
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| PlexNotifyError::Store(format!("Bad timestamp for '{key}': {e}")))?
                .with_timezone(&Utc);
            entries.push(StatusEntry {
                key,
                status,
                updated_at,
            });
        }
        Ok(entries)
    }

    async fn try_acquire_lease(&self, lease: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires_at = lease_expiry(now, ttl)?.timestamp_millis();
        let conn = self.conn.lock().map_err(store_err)?;
        // Zero rows changed means a different holder owns a live lease.
        let changed = conn
            .execute(
                "INSERT INTO run_leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at
                 WHERE run_leases.expires_at <= ?4 OR run_leases.holder = excluded.holder",
                rusqlite::params![lease, holder, expires_at, now.timestamp_millis()],
            )
            .map_err(store_err)?;
        Ok(changed > 0)
    }

    async fn release_lease(&self, lease: &str, holder: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        let removed = conn
            .execute(
                "DELETE FROM run_leases WHERE name = ?1 AND holder = ?2",
                rusqlite::params![lease, holder],
            )
            .map_err(store_err)?;
        if removed == 0 {
            tracing::debug!("Lease '{lease}' was no longer held by {holder}");
        }
        Ok(())
    }
}
