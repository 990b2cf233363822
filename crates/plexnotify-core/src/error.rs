//! Error type shared by every PlexNotify crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlexNotifyError>;

#[derive(Debug, Error)]
pub enum PlexNotifyError {
    #[error("Config error: {0}")]
    Config(String),

    /// Authentication or query failure against the request database.
    #[error("Notion error: {0}")]
    Notion(String),

    /// A row came back without the shape we rely on.
    #[error("Malformed request {page_id}: property '{property}' is missing or invalid")]
    MalformedRecord { page_id: String, property: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlexNotifyError {
    pub fn malformed(page_id: &str, property: &str) -> Self {
        Self::MalformedRecord {
            page_id: page_id.to_string(),
            property: property.to_string(),
        }
    }
}
