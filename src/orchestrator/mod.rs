//! Send orchestration.
//!
//! [`ChatController`] is the entry point a UI talks to. It validates input,
//! appends the optimistic user message and the assistant placeholder to the
//! store, builds the outgoing request, and drives a [`StreamSession`] to its
//! end. At most one session is active per controller: a send that arrives
//! while one is streaming is ignored, not queued.

use crate::attachments::{ImageAttachment, PendingAttachments, validate_images};
use crate::config::ClientConfig;
use crate::defaults::images::IMAGE_ONLY_PLACEHOLDER;
use crate::error::{ChatError, Result};
use crate::store::ConversationStore;
use crate::streaming::{StreamOutcome, StreamSession};
use crate::transport::{ChatRequest, ChatTransport, HttpTransport};
use crate::types::{ConversationId, MessageId};
use crate::utils::{CancelHandle, new_cancel_handle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Why a send did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No text (and no images).
    EmptyInput,
    /// Another response is still streaming.
    Busy,
}

/// Result of a send that was not rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Ignored(IgnoreReason),
    Completed {
        message_id: MessageId,
        fragments: usize,
    },
    Cancelled {
        message_id: MessageId,
        fragments: usize,
    },
}

impl SendOutcome {
    fn from_stream(message_id: MessageId, outcome: StreamOutcome) -> Self {
        match outcome {
            StreamOutcome::Completed { fragments } => SendOutcome::Completed {
                message_id,
                fragments,
            },
            StreamOutcome::Cancelled { fragments } => SendOutcome::Cancelled {
                message_id,
                fragments,
            },
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, SendOutcome::Ignored(_))
    }

    /// Assistant message the response was streamed into.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            SendOutcome::Ignored(_) => None,
            SendOutcome::Completed { message_id, .. } | SendOutcome::Cancelled { message_id, .. } => {
                Some(message_id)
            }
        }
    }
}

pub struct ChatController {
    transport: Arc<dyn ChatTransport>,
    store: ConversationStore,
    conversation_id: Mutex<Option<ConversationId>>,
    streaming: AtomicBool,
    active: Mutex<Option<CancelHandle>>,
}

/// Holds the streaming flag; clears it and releases the cancel handle on
/// every exit path.
struct StreamingGuard<'a> {
    owner: &'a ChatController,
    cancel: CancelHandle,
}

impl Drop for StreamingGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock_active().take();
        self.owner.streaming.store(false, Ordering::SeqCst);
    }
}

impl ChatController {
    /// Controller talking to the backend described by `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    pub fn with_transport(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            store: ConversationStore::new(),
            conversation_id: Mutex::new(None),
            streaming: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Target a conversation from the start.
    pub fn for_conversation(self, conversation_id: ConversationId) -> Self {
        *self.lock_conversation() = Some(conversation_id);
        self.store.reset(Some(conversation_id));
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        *self.lock_conversation()
    }

    /// Switch the target conversation and empty the store for it.
    ///
    /// Refused (returns false) while a response is streaming. The streaming
    /// slot is held during the switch so no send can start halfway through.
    pub fn set_conversation(&self, conversation_id: Option<ConversationId>) -> bool {
        let Some(_guard) = self.begin() else {
            return false;
        };
        let mut current = self.lock_conversation();
        if *current != conversation_id {
            *current = conversation_id;
            self.store.reset(conversation_id);
        }
        true
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Send a text message and stream the answer into the store.
    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(SendOutcome::Ignored(IgnoreReason::EmptyInput));
        }
        let Some(guard) = self.begin() else {
            tracing::debug!("send ignored, response still streaming");
            return Ok(SendOutcome::Ignored(IgnoreReason::Busy));
        };

        let request = ChatRequest::text(self.conversation_id(), trimmed);
        self.store.append_user(trimmed);
        let assistant = self.store.append_assistant_placeholder();
        self.run(guard, assistant, Ok(request)).await
    }

    /// Send text with images as a multipart request.
    ///
    /// Images are validated before anything else happens; a rejected image
    /// returns [`ChatError::Validation`] with a user-facing message and leaves
    /// the store untouched.
    pub async fn send_with_images(
        &self,
        text: &str,
        images: Vec<ImageAttachment>,
    ) -> Result<SendOutcome> {
        let trimmed = text.trim();
        if trimmed.is_empty() && images.is_empty() {
            return Ok(SendOutcome::Ignored(IgnoreReason::EmptyInput));
        }
        validate_images(&images)?;
        let Some(guard) = self.begin() else {
            tracing::debug!("send ignored, response still streaming");
            return Ok(SendOutcome::Ignored(IgnoreReason::Busy));
        };
        self.dispatch_images(guard, trimmed, images).await
    }

    /// Send the composer state: images go multipart, otherwise plain text.
    ///
    /// The attachments are only drained (and their previews released) once
    /// the streaming slot is claimed; a busy send leaves them in place.
    pub async fn send_pending(
        &self,
        text: &str,
        pending: &mut PendingAttachments,
    ) -> Result<SendOutcome> {
        if pending.is_empty() {
            return self.send(text).await;
        }
        let Some(guard) = self.begin() else {
            tracing::debug!("send ignored, response still streaming");
            return Ok(SendOutcome::Ignored(IgnoreReason::Busy));
        };
        let images = pending.take_for_send();
        self.dispatch_images(guard, text.trim(), images).await
    }

    async fn dispatch_images(
        &self,
        guard: StreamingGuard<'_>,
        trimmed: &str,
        images: Vec<ImageAttachment>,
    ) -> Result<SendOutcome> {
        let request = match self.conversation_id() {
            Some(id) => Ok(ChatRequest::multimodal(id, trimmed, images)),
            None => Err(ChatError::MissingConversation),
        };
        let shown = if trimmed.is_empty() {
            IMAGE_ONLY_PLACEHOLDER
        } else {
            trimmed
        };
        self.store.append_user(shown);
        let assistant = self.store.append_assistant_placeholder();
        self.run(guard, assistant, request).await
    }

    /// Abort the active response. Returns false when nothing was streaming.
    pub fn stop(&self) -> bool {
        match self.lock_active().as_ref() {
            Some(handle) => {
                tracing::debug!("stop requested");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Atomically claim the streaming flag and register a cancel handle.
    fn begin(&self) -> Option<StreamingGuard<'_>> {
        if self
            .streaming
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let cancel = new_cancel_handle();
        *self.lock_active() = Some(cancel.clone());
        Some(StreamingGuard {
            owner: self,
            cancel,
        })
    }

    async fn run(
        &self,
        guard: StreamingGuard<'_>,
        assistant: MessageId,
        request: Result<ChatRequest>,
    ) -> Result<SendOutcome> {
        let session = StreamSession::with_cancel(
            self.transport.clone(),
            self.store.clone(),
            assistant.clone(),
            guard.cancel.clone(),
        );
        let result = match request {
            Ok(request) => session.open(request).await,
            Err(err) => Err(session.fail(err)),
        };
        drop(guard);
        result.map(|outcome| SendOutcome::from_stream(assistant, outcome))
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<CancelHandle>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_conversation(&self) -> MutexGuard<'_, Option<ConversationId>> {
        self.conversation_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
