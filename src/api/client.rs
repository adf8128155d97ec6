//! HTTP client for the document backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::response::{body_message, decode_enveloped, decode_plain, error_from_response};
use super::{ApiError, DocumentService};
use crate::models::{DocumentRecord, InteractionRecord};
use crate::upload::UploadFile;

/// Login form.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Account registration form.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    document: Option<DocumentRecord>,
}

/// Authenticated client for the document backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Transport(format!("invalid API URL {}: {}", base_url, e)))?;

        // Url::join replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    fn document_endpoint(&self, document_id: &str, action: &str) -> Result<Url, ApiError> {
        self.endpoint(&format!(
            "documents/{}/{}",
            urlencoding::encode(document_id),
            action
        ))
    }

    /// Send a request and collect status and body.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let request = request
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let start = Instant::now();
        let response = self.client.execute(request).await.map_err(|e| {
            warn!("{} {} failed: {}", method, path, e);
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        debug!(
            "{} {} -> {} ({} bytes, {}ms)",
            method,
            path,
            status.as_u16(),
            body.len(),
            start.elapsed().as_millis()
        );

        Ok((status, body.to_vec()))
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let url = self.endpoint("auth/login")?;
        let (status, body) = self.send(self.client.post(url).json(credentials)).await?;

        let parsed: LoginResponse = decode_plain(status, &body)?;
        parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Application {
                status: Some(status.as_u16()),
                message: body_message(&body),
            })
    }

    /// Create a new account.
    pub async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let url = self.endpoint("users/register")?;
        let (status, body) = self.send(self.client.post(url).json(registration)).await?;

        if status.is_success() {
            Ok(())
        } else {
            Err(error_from_response(status, &body))
        }
    }

    /// Upload an image for OCR and return the created document.
    pub async fn upload(&self, token: &str, file: &UploadFile) -> Result<DocumentRecord, ApiError> {
        let url = self.endpoint("documents/upload")?;
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let (status, body) = self
            .send(self.client.post(url).bearer_auth(token).multipart(form))
            .await?;

        let parsed: UploadResponse = decode_plain(status, &body)?;
        parsed.document.ok_or_else(|| ApiError::Application {
            status: Some(status.as_u16()),
            message: body_message(&body),
        })
    }
}

#[async_trait]
impl DocumentService for ApiClient {
    async fn list_documents(&self, token: &str) -> Result<Vec<DocumentRecord>, ApiError> {
        let url = self.endpoint("documents/history")?;
        let (status, body) = self.send(self.client.get(url).bearer_auth(token)).await?;
        decode_plain(status, &body)
    }

    async fn list_interactions(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Vec<InteractionRecord>, ApiError> {
        let url = self.document_endpoint(document_id, "interactions")?;
        let (status, body) = self.send(self.client.get(url).bearer_auth(token)).await?;
        let records: Vec<InteractionRecord> = decode_enveloped(status, &body)?;

        Ok(records
            .into_iter()
            .map(|r| r.with_document_fallback(document_id))
            .collect())
    }

    async fn ask_question(
        &self,
        token: &str,
        document_id: &str,
        question: &str,
    ) -> Result<InteractionRecord, ApiError> {
        let url = self.document_endpoint(document_id, "ask")?;
        let request = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&AskRequest { question });
        let (status, body) = self.send(request).await?;
        let record: InteractionRecord = decode_enveloped(status, &body)?;

        Ok(record.with_document_fallback(document_id))
    }
}
