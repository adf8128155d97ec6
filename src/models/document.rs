//! Document records as returned by the document history endpoint.
//!
//! Documents are created by the ingestion service; the client only reads them.
//! The wire format uses camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processed,
    Failed,
    /// Status string this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An uploaded document with its OCR output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Server-assigned identifier.
    pub id: String,
    /// Original file name of the upload.
    pub file_name: String,
    /// When the document was ingested.
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: DocumentStatus,
    /// Text produced by OCR, once processing succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    /// Image as a `data:` URL.
    #[serde(
        default,
        rename = "imageBase64",
        alias = "encodedImage",
        skip_serializing_if = "Option::is_none"
    )]
    pub encoded_image: Option<String>,
}

impl DocumentRecord {
    /// Check whether OCR text is available.
    pub fn has_text(&self) -> bool {
        self.extracted_text
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Check whether the record carries an image payload.
    pub fn has_image(&self) -> bool {
        self.encoded_image
            .as_deref()
            .is_some_and(|i| !i.is_empty())
    }

    /// Match against a user-supplied reference: exact id, id prefix, or
    /// case-insensitive file name fragment.
    pub fn matches_reference(&self, reference: &str) -> bool {
        self.id == reference
            || self.id.starts_with(reference)
            || self
                .file_name
                .to_lowercase()
                .contains(&reference.to_lowercase())
    }
}
