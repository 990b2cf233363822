//! Capability traits the reconciliation engine is wired through.

pub mod notifier;
pub mod source;
pub mod store;

pub use notifier::Notifier;
pub use source::RequestSource;
pub use store::StateStore;
