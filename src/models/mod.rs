//! Data models for scandesk.

mod document;
mod interaction;

pub use document::{DocumentRecord, DocumentStatus};
pub use interaction::InteractionRecord;
