//! # PlexNotify Store
//!
//! Last-observed status per request, keyed by identity key.
//!
//! - `SqliteStateStore`: durable, survives restarts, holds run leases
//! - `MemoryStateStore`: same semantics in a `HashMap`, for tests and dry runs

use std::time::Duration;

use chrono::{DateTime, Utc};
use plexnotify_core::error::{PlexNotifyError, Result};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

/// `now + ttl`, or a `Store` error when the expiry is out of range.
pub(crate) fn lease_expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            PlexNotifyError::Store(format!("Lease TTL of {}s is out of range", ttl.as_secs()))
        })
}
