//! # PlexNotify Notifier
//!
//! Renders the "your request is ready" / "we couldn't find it" emails and
//! hands them to the delivery service, one HTTP POST per notification.

pub mod email;
pub mod templates;

pub use email::{DeliveryRequest, EmailNotifier};
pub use templates::{RenderedEmail, render};
