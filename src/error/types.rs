//! Core error types.

use thiserror::Error;

/// Errors produced by the chat client.
///
/// Cancellation is not an error: an aborted stream ends with
/// [`crate::streaming::StreamOutcome::Cancelled`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The backend answered with a non-success status.
    #[error("Request failed: {status}")]
    RequestFailed { status: u16 },

    /// The backend answered successfully but without a body to stream.
    #[error("Request failed: response has no body")]
    MissingBody,

    /// Connection-level failure (DNS, connect, TLS, send).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failure while reading or decoding the response body.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Input rejected before any network call. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    /// Image-bearing sends need a conversation to target.
    #[error("Missing conversation id")]
    MissingConversation,

    /// A records API call failed.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// JSON could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification for presentation and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    Server,
    Network,
    Validation,
    Parsing,
    Configuration,
}

impl ChatError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChatError::RequestFailed { status } | ChatError::Api { status, .. } => {
                if *status >= 500 {
                    ErrorCategory::Server
                } else {
                    ErrorCategory::Client
                }
            }
            ChatError::MissingBody => ErrorCategory::Server,
            ChatError::Http(_) | ChatError::Stream(_) => ErrorCategory::Network,
            ChatError::Validation(_) | ChatError::MissingConversation => ErrorCategory::Validation,
            ChatError::Parse(_) => ErrorCategory::Parsing,
            ChatError::Config(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether the message is meant to be shown verbatim to an end user.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::RequestFailed { status } | ChatError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
