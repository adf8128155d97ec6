//! Backend API access.
//!
//! The session controller only needs the three calls in [`DocumentService`];
//! [`ApiClient`] implements them over HTTP and additionally exposes the
//! authentication and ingestion endpoints used by the CLI.

mod client;
mod response;

pub use client::{ApiClient, Credentials, Registration};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DocumentRecord, InteractionRecord};

/// Shown for failures where the server gave no usable explanation.
pub const CONNECTION_FAILED_MESSAGE: &str = "could not connect to the server";

/// Errors returned by backend calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Network failure, timeout, or a response without a parseable body.
    #[error("Connection error: {0}")]
    Transport(String),

    /// The server rejected the request (non-2xx status or `success: false`).
    #[error("{}", .message.as_deref().unwrap_or("request rejected by server"))]
    Application {
        status: Option<u16>,
        message: Option<String>,
    },
}

impl ApiError {
    /// Text to show the user, using `fallback` when the server sent no message.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Transport(_) => CONNECTION_FAILED_MESSAGE.to_string(),
            ApiError::Application {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Application { message: None, .. } => fallback.to_string(),
        }
    }

    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Application { status, .. } => *status,
            ApiError::Transport(_) => None,
        }
    }
}

/// Document history and assistant calls consumed by the session controller.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Fetch all documents of the authenticated user.
    async fn list_documents(&self, token: &str) -> Result<Vec<DocumentRecord>, ApiError>;

    /// Fetch a document's interaction history, newest first.
    async fn list_interactions(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Vec<InteractionRecord>, ApiError>;

    /// Ask the assistant a question about a document.
    async fn ask_question(
        &self,
        token: &str,
        document_id: &str,
        question: &str,
    ) -> Result<InteractionRecord, ApiError>;
}
