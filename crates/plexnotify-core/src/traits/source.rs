//! Snapshot source trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RequestRecord;

/// Produces the current set of requests that have a notification target.
#[async_trait]
pub trait RequestSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a fresh snapshot. No side effects, no internal retry.
    async fn fetch(&self) -> Result<Vec<RequestRecord>>;
}
