//! Notion REST client for the request database.

use async_trait::async_trait;
use plexnotify_core::config::NotionConfig;
use plexnotify_core::error::{PlexNotifyError, Result};
use plexnotify_core::traits::RequestSource;
use plexnotify_core::types::RequestRecord;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::page::{PROP_EMAIL, parse_page};

/// One page of a database query response.
#[derive(Debug, Deserialize)]
struct QueryPage {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct NotionClient {
    /// Integration secret, sent as a bearer token.
    api_key: String,
    database_id: String,
    /// e.g. "https://api.notion.com/v1".
    base_url: String,
    notion_version: String,
    page_size: u32,
    client: reqwest::Client,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Self {
        Self {
            api_key: config.integration_key.clone(),
            database_id: config.database_id.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            notion_version: config.notion_version.clone(),
            page_size: config.page_size.clamp(1, 100),
            client: reqwest::Client::new(),
        }
    }

    fn query_url(&self) -> String {
        format!("{}/databases/{}/query", self.base_url, self.database_id)
    }

    fn query_body(&self, cursor: Option<&str>) -> Value {
        let mut body = json!({
            "filter": {
                "property": PROP_EMAIL,
                "email": { "is_not_empty": true }
            },
            "page_size": self.page_size,
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }

    async fn query_page(&self, cursor: Option<&str>) -> Result<QueryPage> {
        let resp = self
            .client
            .post(self.query_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", &self.notion_version)
            .json(&self.query_body(cursor))
            .send()
            .await
            .map_err(|e| PlexNotifyError::Notion(format!("Query request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlexNotifyError::Notion(format!(
                "Query failed with {status}: {body}"
            )));
        }

        resp.json::<QueryPage>()
            .await
            .map_err(|e| PlexNotifyError::Notion(format!("Invalid query response: {e}")))
    }
}

#[async_trait]
impl RequestSource for NotionClient {
    fn name(&self) -> &str {
        "notion"
    }

    async fn fetch(&self) -> Result<Vec<RequestRecord>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.query_page(cursor.as_deref()).await?;
            pages += 1;
            for result in &page.results {
                records.push(parse_page(result)?);
            }

            if !page.has_more {
                break;
            }
            cursor = match page.next_cursor {
                Some(next) => Some(next),
                None => {
                    return Err(PlexNotifyError::Notion(
                        "has_more without next_cursor".into(),
                    ));
                }
            };
        }

        tracing::debug!(
            "📥 Fetched {} request(s) in {} page(s) from Notion",
            records.len(),
            pages
        );
        Ok(records)
    }
}
