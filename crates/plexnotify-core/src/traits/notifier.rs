//! Notifier trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Outcome;

/// Sends one notification per call. No retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_fulfilled(&self, email: &str, title: &str, who: &str) -> Result<()>;

    async fn notify_not_found(&self, email: &str, title: &str, who: &str) -> Result<()>;

    async fn notify(&self, outcome: Outcome, email: &str, title: &str, who: &str) -> Result<()> {
        match outcome {
            Outcome::Fulfilled => self.notify_fulfilled(email, title, who).await,
            Outcome::NotFound => self.notify_not_found(email, title, who).await,
        }
    }
}
