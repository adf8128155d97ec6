//! Question/answer exchanges about a document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question asked about a document and the assistant's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub id: String,
    /// Document this exchange belongs to. Filled in by the client when the
    /// server leaves it out.
    #[serde(default)]
    pub document_id: String,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Set the document back-reference if the server did not send one.
    pub fn with_document_fallback(mut self, document_id: &str) -> Self {
        if self.document_id.is_empty() {
            self.document_id = document_id.to_string();
        }
        self
    }
}
