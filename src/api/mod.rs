//! Conversation and document records API.
//!
//! Thin client for the backend's record endpoints. Every call maps a
//! non-success status to [`ChatError::Api`] carrying the operation name, e.g.
//! `Failed to list conversations: 500`.

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::types::{Conversation, ConversationId, Document, Message};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct RecordsClient {
    client: reqwest::Client,
    config: ClientConfig,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Serialize)]
struct RenameBody<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct SettingsBody<'a> {
    settings: &'a str,
}

impl RecordsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let rb = self
            .client
            .post(self.config.endpoint("/api/conversations"))
            .json(&CreateBody { title });
        self.execute_json("create conversation", rb).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let rb = self
            .client
            .get(self.config.endpoint("/api/conversations"))
            .header(reqwest::header::CACHE_CONTROL, "no-store");
        self.execute_json("list conversations", rb).await
    }

    pub async fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        let rb = self
            .client
            .get(self.config.endpoint(&format!("/api/conversations/{id}")));
        self.execute_json("get conversation", rb).await
    }

    pub async fn list_messages(&self, id: ConversationId) -> Result<Vec<Message>> {
        let rb = self
            .client
            .get(self.config.endpoint(&format!("/api/conversations/{id}/messages")))
            .header(reqwest::header::CACHE_CONTROL, "no-store");
        self.execute_json("list messages", rb).await
    }

    pub async fn rename_conversation(
        &self,
        id: ConversationId,
        title: &str,
    ) -> Result<Conversation> {
        let rb = self
            .client
            .patch(self.config.endpoint(&format!("/api/conversations/{id}")))
            .json(&RenameBody { title });
        self.execute_json("rename conversation", rb).await
    }

    /// Replace the conversation's settings.
    ///
    /// `settings` must be a JSON document; it is checked locally before the
    /// request is made and then sent as an encoded string.
    pub async fn update_settings(
        &self,
        id: ConversationId,
        settings: &str,
    ) -> Result<Conversation> {
        serde_json::from_str::<serde_json::Value>(settings)?;
        let rb = self
            .client
            .patch(self.config.endpoint(&format!("/api/conversations/{id}")))
            .json(&SettingsBody { settings });
        self.execute_json("update conversation", rb).await
    }

    pub async fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        let rb = self
            .client
            .delete(self.config.endpoint(&format!("/api/conversations/{id}")));
        self.execute("delete conversation", rb).await?;
        Ok(())
    }

    /// Return `current`, or create a fresh conversation when there is none.
    pub async fn ensure_conversation(&self, current: Option<Conversation>) -> Result<Conversation> {
        match current {
            Some(conversation) => Ok(conversation),
            None => self.create_conversation(None).await,
        }
    }

    pub async fn upload_document(
        &self,
        id: ConversationId,
        file_name: &str,
        content_type: &str,
        bytes: bytes::Bytes,
    ) -> Result<Document> {
        let len = bytes.len() as u64;
        let part = Part::stream_with_length(reqwest::Body::from(bytes), len)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ChatError::Validation(format!("invalid content type '{content_type}': {e}")))?;
        let rb = self
            .client
            .post(self.config.endpoint(&format!("/api/conversations/{id}/documents")))
            .multipart(Form::new().part("file", part));
        self.execute_json("upload document", rb).await
    }

    pub async fn list_documents(&self, id: ConversationId) -> Result<Vec<Document>> {
        let rb = self
            .client
            .get(self.config.endpoint(&format!("/api/conversations/{id}/documents")))
            .header(reqwest::header::CACHE_CONTROL, "no-store");
        self.execute_json("list documents", rb).await
    }

    async fn execute(
        &self,
        operation: &str,
        rb: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = rb
            .send()
            .await
            .map_err(|e| ChatError::Http(format!("Failed to {operation}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(operation, status = status.as_u16(), "records request failed");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: format!("Failed to {operation}: {}", status.as_u16()),
            });
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        rb: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(operation, rb).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Http(format!("Failed to {operation}: {e}")))?;
        serde_json::from_str(&text).map_err(|e| {
            ChatError::Parse(format!("Failed to {operation}: invalid response body: {e}"))
        })
    }
}
