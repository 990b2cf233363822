//! # PlexNotify Core
//!
//! Shared vocabulary for the PlexNotify crates: the request data model,
//! configuration, the error type, and the capability traits that the
//! reconciliation engine is wired through.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::PlexNotifyConfig;
pub use error::{PlexNotifyError, Result};
pub use types::{Outcome, RequestRecord, StatusEntry, StatusVocabulary};
