//! PlexNotify configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PlexNotifyError, Result};
use crate::types::StatusVocabulary;

/// Env var holding the Notion integration secret.
pub const ENV_NOTION_KEY: &str = "NOTION_INTEGRATION_KEY";
/// Env var holding the request database id.
pub const ENV_NOTION_DATABASE: &str = "NOTION_PLEX_REQUEST_DATABASE_ID";
/// Upper bound for `scheduler.lease_ttl_secs` (one week).
pub const MAX_LEASE_TTL_SECS: u64 = 7 * 24 * 3600;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlexNotifyConfig {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub statuses: StatusConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl PlexNotifyConfig {
    /// Load config from the default path (~/.plexnotify/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlexNotifyError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PlexNotifyError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PlexNotifyError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the PlexNotify home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".plexnotify")
    }

    /// Fill empty Notion credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.notion.integration_key.is_empty() {
            if let Some(key) = lookup(ENV_NOTION_KEY).filter(|v| !v.is_empty()) {
                self.notion.integration_key = key;
            }
        }
        if self.notion.database_id.is_empty() {
            if let Some(id) = lookup(ENV_NOTION_DATABASE).filter(|v| !v.is_empty()) {
                self.notion.database_id = id;
            }
        }
    }

    /// Reject configs that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.notion.integration_key.is_empty() {
            return Err(PlexNotifyError::Config(format!(
                "notion.integration_key is empty (set it or {ENV_NOTION_KEY})"
            )));
        }
        if self.notion.database_id.is_empty() {
            return Err(PlexNotifyError::Config(format!(
                "notion.database_id is empty (set it or {ENV_NOTION_DATABASE})"
            )));
        }
        if self.notifier.endpoint.is_empty() {
            return Err(PlexNotifyError::Config("notifier.endpoint is empty".into()));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(PlexNotifyError::Config(
                "scheduler.interval_secs must be positive".into(),
            ));
        }
        if self.scheduler.lease_ttl_secs == 0 || self.scheduler.lease_ttl_secs > MAX_LEASE_TTL_SECS {
            return Err(PlexNotifyError::Config(format!(
                "scheduler.lease_ttl_secs must be between 1 and {MAX_LEASE_TTL_SECS}"
            )));
        }
        if self.statuses.fulfilled == self.statuses.not_found {
            return Err(PlexNotifyError::Config(
                "statuses.fulfilled and statuses.not_found must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Notion request database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub integration_key: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_api_base() -> String { "https://api.notion.com/v1".into() }
fn default_notion_version() -> String { "2022-06-28".into() }
fn default_page_size() -> u32 { 100 }

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            integration_key: String::new(),
            database_id: String::new(),
            api_base: default_api_base(),
            notion_version: default_notion_version(),
            page_size: default_page_size(),
        }
    }
}

/// Status names that trigger a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_fulfilled")]
    pub fulfilled: String,
    #[serde(default = "default_not_found")]
    pub not_found: String,
}

fn default_fulfilled() -> String { "Done".into() }
fn default_not_found() -> String { "Not Found".into() }

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            fulfilled: default_fulfilled(),
            not_found: default_not_found(),
        }
    }
}

impl StatusConfig {
    pub fn vocabulary(&self) -> StatusVocabulary {
        StatusVocabulary::new(&self.fulfilled, &self.not_found)
    }
}

/// Email delivery service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name used in the email body copy.
    #[serde(default = "default_curator")]
    pub curator_name: String,
}

fn default_endpoint() -> String { "https://send-email.ng-cloudflare.workers.dev/".into() }
fn default_curator() -> String { "Nikita".into() }

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            curator_name: default_curator(),
        }
    }
}

/// Status store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.plexnotify/state.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Run cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// How long a crashed run may block later runs.
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,
}

fn default_interval() -> u64 { 300 }
fn default_lease_ttl() -> u64 { 900 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            lease_ttl_secs: default_lease_ttl(),
        }
    }
}
