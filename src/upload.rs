//! Local validation of images before they are sent for OCR.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors detected before an upload reaches the network.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Select an image to upload: {0} not found")]
    Missing(PathBuf),

    #[error("{0} is empty")]
    Empty(String),

    #[error("Only images can be uploaded: {file_name} looks like {detected}")]
    NotAnImage { file_name: String, detected: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An image ready to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Validate in-memory content. The media type is sniffed from the bytes,
    /// falling back to the file extension when the content is not recognised.
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty(file_name.to_string()));
        }

        let media_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| {
                mime_guess::from_path(file_name)
                    .first()
                    .map(|m| m.essence_str().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !media_type.starts_with("image/") {
            return Err(UploadError::NotAnImage {
                file_name: file_name.to_string(),
                detected: media_type,
            });
        }

        Ok(Self {
            file_name: file_name.to_string(),
            media_type,
            bytes,
        })
    }

    /// Read and validate a file from disk.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        if !path.is_file() {
            return Err(UploadError::Missing(path.to_path_buf()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = tokio::fs::read(path).await?;

        Self::from_bytes(&file_name, bytes)
    }
}
