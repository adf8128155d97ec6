//! Per-user document session: document list, the expanded document's
//! interaction thread, and archive export.

mod controller;
mod thread;

pub use controller::{
    DocumentSession, ExpandedDocument, ListStatus, LoadOutcome, SessionState, SubmitOutcome,
    ToggleOutcome, LIST_FAILED_MESSAGE,
};
pub use thread::{
    InteractionThread, SubmitGate, SubmitStatus, ThreadStatus, EMPTY_QUESTION_MESSAGE,
    LOAD_FAILED_MESSAGE, SUBMIT_FAILED_MESSAGE,
};

use thiserror::Error;

use crate::api::ApiError;
use crate::encoding::MalformedEncodingError;
use crate::export::ArchiveError;

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid input caught before any network call.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    MalformedEncoding(#[from] MalformedEncodingError),

    #[error("Failed to build archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Failed to save archive: {0}")]
    Save(#[from] std::io::Error),

    #[error("Document not found: {0}")]
    UnknownDocument(String),

    #[error("Document {0} is not open")]
    NotExpanded(String),
}
