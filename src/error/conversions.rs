//! Conversions from external error types into `ChatError`.

use super::types::ChatError;

/// Status errors keep their code, body and decode failures are stream
/// errors, anything else (connect, TLS, timeout) is an HTTP error.
impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ChatError::RequestFailed {
                status: status.as_u16(),
            };
        }
        if err.is_body() || err.is_decode() {
            return ChatError::Stream(err.to_string());
        }
        ChatError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Parse(err.to_string())
    }
}
