//! Interpretation of backend response bodies.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ApiError;

/// `{success, data, message}` wrapper used by the interaction endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<MessageField>,
}

/// Error body. Validation failures may carry a list of messages.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<MessageField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl MessageField {
    fn into_text(self) -> Option<String> {
        let text = match self {
            MessageField::One(text) => text,
            MessageField::Many(parts) => parts.join("; "),
        };
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Server-supplied `message` of a JSON body, if any.
pub(crate) fn body_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .and_then(MessageField::into_text)
}

/// Convert a non-2xx response into an error.
///
/// A JSON object body makes it an application error (with its message, if
/// any); anything else is treated as a transport failure.
pub(crate) fn error_from_response(status: StatusCode, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => ApiError::Application {
            status: Some(status.as_u16()),
            message: parsed.message.and_then(MessageField::into_text),
        },
        Err(_) => ApiError::Transport(format!("HTTP {}", status)),
    }
}

/// Decode a body that is the payload itself (no envelope).
pub(crate) fn decode_plain<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(error_from_response(status, body));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Transport(format!("invalid response body: {}", e)))
}

/// Decode a `{success, data}` envelope.
pub(crate) fn decode_enveloped<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(error_from_response(status, body));
    }

    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| ApiError::Transport(format!("invalid response body: {}", e)))?;

    if !envelope.success {
        return Err(ApiError::Application {
            status: Some(status.as_u16()),
            message: envelope.message.and_then(MessageField::into_text),
        });
    }

    envelope
        .data
        .ok_or_else(|| ApiError::Transport("response is missing its data field".to_string()))
}
