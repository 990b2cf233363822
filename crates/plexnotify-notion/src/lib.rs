//! # PlexNotify Notion
//!
//! Fetches request rows from a Notion database and decodes them into
//! [`RequestRecord`](plexnotify_core::RequestRecord)s. Only rows with an
//! `Email` are returned; a row missing any other property fails the fetch.

pub mod client;
pub mod page;

pub use client::NotionClient;
pub use page::parse_page;
