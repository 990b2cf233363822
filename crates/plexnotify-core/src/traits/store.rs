//! State store trait: last observed status per identity key.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::StatusEntry;

/// Durable key → status mapping, plus run leases.
///
/// Implementations must give read-your-writes consistency within a run.
#[async_trait]
pub trait StateStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, status: &str) -> Result<()>;

    /// All tracked entries, ordered by key.
    async fn entries(&self) -> Result<Vec<StatusEntry>>;

    /// Take the named lease for `ttl` unless another holder owns an
    /// unexpired one. Returns whether `holder` now owns it.
    async fn try_acquire_lease(&self, lease: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Drop the lease if `holder` still owns it.
    async fn release_lease(&self, lease: &str, holder: &str) -> Result<()>;
}
