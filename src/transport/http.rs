//! reqwest-backed chat transport.

use super::{ByteStream, ChatRequest, ChatTransport};
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

/// Streams chat responses from the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    /// Reuse an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_request(&self, request: &ChatRequest) -> Result<reqwest::RequestBuilder> {
        let url = self.config.endpoint(&request.path());
        let mut rb = match request {
            ChatRequest::Text { text, .. } => self
                .client
                .post(&url)
                .json(&serde_json::json!({ "message": text })),
            ChatRequest::Multimodal { text, images, .. } => {
                let mut form = Form::new().text("message", text.clone());
                for image in images {
                    let part = Part::stream_with_length(
                        reqwest::Body::from(image.bytes.clone()),
                        image.bytes.len() as u64,
                    )
                    .file_name(image.file_name.clone())
                    .mime_str(&image.content_type)
                    .map_err(|e| {
                        ChatError::Validation(format!(
                            "invalid content type '{}': {e}",
                            image.content_type
                        ))
                    })?;
                    form = form.part("images", part);
                }
                self.client
                    .post(&url)
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .multipart(form)
            }
        };
        if self.config.stream_disable_compression {
            rb = rb.header(reqwest::header::ACCEPT_ENCODING, "identity");
        }
        Ok(rb)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        let rb = self.build_request(request)?;
        tracing::debug!(
            path = %request.path(),
            images = request.image_count(),
            "opening chat stream"
        );

        let response = rb.send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "chat request failed");
            return Err(ChatError::RequestFailed {
                status: status.as_u16(),
            });
        }
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Err(ChatError::MissingBody);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ChatError::from));
        Ok(Box::pin(body))
    }
}
