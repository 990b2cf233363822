//! Request data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between the components of an identity key.
pub const KEY_SEPARATOR: &str = "-";

/// One request row as seen in the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Page id assigned by the request database.
    pub id: String,
    /// Where notifications go.
    pub email: String,
    /// Display name of the requester.
    pub who: String,
    /// What was requested.
    pub title: String,
    /// Current status name, open-ended.
    pub status: String,
}

impl RequestRecord {
    /// Stable key under which the last seen status is persisted.
    ///
    /// Composed of email, title and id in that order. Editing the email or
    /// the title upstream yields a new key.
    pub fn identity_key(&self) -> String {
        [self.email.as_str(), self.title.as_str(), self.id.as_str()].join(KEY_SEPARATOR)
    }
}

/// The two statuses that produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Fulfilled,
    NotFound,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Fulfilled => write!(f, "fulfilled"),
            Outcome::NotFound => write!(f, "not-found"),
        }
    }
}

/// Maps raw status names onto terminal outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusVocabulary {
    pub fulfilled: String,
    pub not_found: String,
}

impl StatusVocabulary {
    pub fn new(fulfilled: &str, not_found: &str) -> Self {
        Self {
            fulfilled: fulfilled.to_string(),
            not_found: not_found.to_string(),
        }
    }

    /// `None` for every pass-through status.
    pub fn classify(&self, status: &str) -> Option<Outcome> {
        if status == self.fulfilled {
            Some(Outcome::Fulfilled)
        } else if status == self.not_found {
            Some(Outcome::NotFound)
        } else {
            None
        }
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self::new("Done", "Not Found")
    }
}

/// A persisted status entry, as listed by `StateStore::entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub key: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}
