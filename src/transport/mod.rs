//! Chat transport abstraction.
//!
//! A transport turns a [`ChatRequest`] into the response body as a byte
//! stream. [`HttpTransport`] talks to the backend over reqwest; tests and
//! embedders can inject their own implementation to script responses.

mod http;

pub use http::HttpTransport;

use crate::attachments::ImageAttachment;
use crate::error::ChatError;
use crate::types::ConversationId;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

/// Response body as it arrives from the network.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Outgoing chat request.
#[derive(Debug, Clone)]
pub enum ChatRequest {
    /// Plain text, sent as JSON `{ "message": text }`.
    Text {
        conversation_id: Option<ConversationId>,
        text: String,
    },
    /// Text plus images, sent as a multipart form.
    Multimodal {
        conversation_id: ConversationId,
        text: String,
        images: Vec<ImageAttachment>,
    },
}

impl ChatRequest {
    pub fn text(conversation_id: Option<ConversationId>, text: impl Into<String>) -> Self {
        ChatRequest::Text {
            conversation_id,
            text: text.into(),
        }
    }

    pub fn multimodal(
        conversation_id: ConversationId,
        text: impl Into<String>,
        images: Vec<ImageAttachment>,
    ) -> Self {
        ChatRequest::Multimodal {
            conversation_id,
            text: text.into(),
            images,
        }
    }

    /// Backend path for this request.
    pub fn path(&self) -> String {
        match self {
            ChatRequest::Text {
                conversation_id: None,
                ..
            } => "/api/chat".to_string(),
            ChatRequest::Text {
                conversation_id: Some(id),
                ..
            } => format!("/api/chat/{id}/messages"),
            ChatRequest::Multimodal {
                conversation_id, ..
            } => format!("/api/chat/{conversation_id}/messages/multimodal"),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ChatRequest::Text { text, .. } | ChatRequest::Multimodal { text, .. } => text,
        }
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        match self {
            ChatRequest::Text {
                conversation_id, ..
            } => *conversation_id,
            ChatRequest::Multimodal {
                conversation_id, ..
            } => Some(*conversation_id),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            ChatRequest::Text { .. } => 0,
            ChatRequest::Multimodal { images, .. } => images.len(),
        }
    }
}

/// Opens a streamed chat exchange.
///
/// Implementations must fail with [`ChatError::RequestFailed`] on a
/// non-success status and [`ChatError::MissingBody`] when the backend sends
/// no body. The returned stream is dropped to abort the exchange.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}
