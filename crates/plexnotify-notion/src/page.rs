//! Decoding of Notion page objects into request records.

use plexnotify_core::error::{PlexNotifyError, Result};
use plexnotify_core::types::RequestRecord;
use serde_json::Value;

pub const PROP_EMAIL: &str = "Email";
pub const PROP_WHO: &str = "Who is this?";
pub const PROP_TITLE: &str = "What should I add?";
pub const PROP_STATUS: &str = "Status";

/// Decode one page from a database query result.
///
/// Every property is mandatory: a missing or mistyped one is a board
/// configuration problem and surfaces as `MalformedRecord`.
pub fn parse_page(page: &Value) -> Result<RequestRecord> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PlexNotifyError::malformed("<unknown>", "id"))?;

    let props = page
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| PlexNotifyError::malformed(id, "properties"))?;

    let email = props
        .get(PROP_EMAIL)
        .and_then(|p| p.get("email"))
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| PlexNotifyError::malformed(id, PROP_EMAIL))?;

    let who = first_plain_text(props.get(PROP_WHO), "rich_text")
        .ok_or_else(|| PlexNotifyError::malformed(id, PROP_WHO))?;

    let title = first_plain_text(props.get(PROP_TITLE), "title")
        .ok_or_else(|| PlexNotifyError::malformed(id, PROP_TITLE))?;

    let status = props
        .get(PROP_STATUS)
        .and_then(|p| p.get("status"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| PlexNotifyError::malformed(id, PROP_STATUS))?;

    Ok(RequestRecord {
        id: id.to_string(),
        email: email.to_string(),
        who: who.to_string(),
        title: title.to_string(),
        status: status.to_string(),
    })
}

/// `plain_text` of the first block in a `title` / `rich_text` array.
fn first_plain_text<'a>(prop: Option<&'a Value>, kind: &str) -> Option<&'a str> {
    prop?
        .get(kind)?
        .as_array()?
        .first()?
        .get("plain_text")?
        .as_str()
}
