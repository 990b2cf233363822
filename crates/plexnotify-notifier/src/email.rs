//! Email notifier backed by an HTTP delivery endpoint.

use async_trait::async_trait;
use plexnotify_core::config::NotifierConfig;
use plexnotify_core::error::{PlexNotifyError, Result};
use plexnotify_core::traits::Notifier;
use plexnotify_core::types::Outcome;
use serde::{Deserialize, Serialize};

use crate::templates::{self, RenderedEmail};

/// JSON body accepted by the delivery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub to_email: String,
    pub subject: String,
    pub html: String,
}

pub struct EmailNotifier {
    endpoint: String,
    /// Name signed into the body copy.
    curator: String,
    client: reqwest::Client,
}

impl EmailNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            curator: config.curator_name.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn compose(&self, outcome: Outcome, email: &str, title: &str, who: &str) -> Result<DeliveryRequest> {
        let image = templates::pick_image(outcome, &mut rand::thread_rng()).ok_or_else(|| {
            PlexNotifyError::Config(format!("No images configured for {outcome} emails"))
        })?;
        let RenderedEmail { subject, html } =
            templates::render(outcome, title, who, &self.curator, image);
        Ok(DeliveryRequest {
            to_email: email.to_string(),
            subject,
            html,
        })
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| PlexNotifyError::Delivery(format!("Send to {} failed: {e}", self.endpoint)))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(PlexNotifyError::Delivery(format!(
                "Delivery endpoint returned {status}: {body}"
            )))
        }
    }

    async fn send(&self, outcome: Outcome, email: &str, title: &str, who: &str) -> Result<()> {
        let request = self.compose(outcome, email, title, who)?;
        self.deliver(&request).await?;
        tracing::info!("📧 Sent {outcome} email to {email} for '{title}'");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_fulfilled(&self, email: &str, title: &str, who: &str) -> Result<()> {
        self.send(Outcome::Fulfilled, email, title, who).await
    }

    async fn notify_not_found(&self, email: &str, title: &str, who: &str) -> Result<()> {
        self.send(Outcome::NotFound, email, title, who).await
    }
}
