//! In-memory status store. Nothing survives the process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plexnotify_core::error::{PlexNotifyError, Result};
use plexnotify_core::traits::StateStore;
use plexnotify_core::types::StatusEntry;

use crate::lease_expiry;

#[derive(Default)]
struct Inner {
    statuses: HashMap<String, (String, DateTime<Utc>)>,
    leases: HashMap<String, (String, DateTime<Utc>)>,
    writes: usize,
}

#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate entries.
    pub fn with_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let now = Utc::now();
        let statuses = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), (v.to_string(), now)))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                statuses,
                ..Inner::default()
            }),
        }
    }

    /// Number of `put` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }

    /// Plain key → status view.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner
            .lock()
            .map(|i| {
                i.statuses
                    .iter()
                    .map(|(k, (v, _))| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| PlexNotifyError::Store(format!("memory store poisoned: {e}")))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.statuses.get(key).map(|(s, _)| s.clone()))
    }

    async fn put(&self, key: &str, status: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .statuses
            .insert(key.to_string(), (status.to_string(), Utc::now()));
        inner.writes += 1;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<StatusEntry>> {
        let inner = self.lock()?;
        let mut entries: Vec<StatusEntry> = inner
            .statuses
            .iter()
            .map(|(key, (status, updated_at))| StatusEntry {
                key: key.clone(),
                status: status.clone(),
                updated_at: *updated_at,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn try_acquire_lease(&self, lease: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires_at = lease_expiry(now, ttl)?;
        let mut inner = self.lock()?;
        let free = match inner.leases.get(lease) {
            Some((owner, expires_at)) => owner == holder || *expires_at <= now,
            None => true,
        };
        if free {
            inner
                .leases
                .insert(lease.to_string(), (holder.to_string(), expires_at));
        }
        Ok(free)
    }

    async fn release_lease(&self, lease: &str, holder: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.leases.get(lease).is_some_and(|(owner, _)| owner == holder) {
            inner.leases.remove(lease);
        }
        Ok(())
    }
}
