//! Conversation state store.
//!
//! Single source of truth for the visible message list of the active
//! conversation. The store is a cheap-to-clone handle around a
//! `tokio::sync::watch` channel: every mutation goes through the channel's
//! lock and notifies subscribers, so a renderer can `subscribe()` and redraw
//! on `changed()`.
//!
//! In-flight assistant content is only ever touched through
//! [`ConversationStore::apply_token`], which addresses messages by id.

use crate::defaults::stream::ERROR_MARKER;
use crate::types::{ConversationId, Message, MessageId, Role};
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Conversation the messages belong to; `None` for the standalone chat.
    pub conversation_id: Option<ConversationId>,
    pub messages: Vec<Message>,
    /// Whether the list was hydrated since the last conversation switch.
    pub seeded: bool,
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    inner: Arc<watch::Sender<Transcript>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::for_conversation(None)
    }

    pub fn for_conversation(conversation_id: Option<ConversationId>) -> Self {
        let (tx, _rx) = watch::channel(Transcript {
            conversation_id,
            ..Default::default()
        });
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Receive a notification after every change.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.inner.subscribe()
    }

    /// Replace the whole list with messages loaded for `conversation_id`.
    ///
    /// Switching to another conversation always replaces the list. For the
    /// current conversation the list is only hydrated once, and only while it
    /// is still empty, so a late initial load never clobbers messages that
    /// were appended (or are streaming) in the meantime. Returns whether the
    /// list was replaced.
    pub fn seed(&self, conversation_id: Option<ConversationId>, messages: Vec<Message>) -> bool {
        let replaced = self.inner.send_if_modified(|t| {
            let switching = t.conversation_id != conversation_id;
            if switching || (!t.seeded && t.messages.is_empty()) {
                t.conversation_id = conversation_id;
                t.messages = messages;
                t.seeded = true;
                true
            } else {
                false
            }
        });
        if !replaced {
            tracing::debug!(?conversation_id, "seed ignored, store already hydrated");
        }
        replaced
    }

    /// Switch to `conversation_id` with an empty, not yet seeded list.
    pub fn reset(&self, conversation_id: Option<ConversationId>) {
        self.inner.send_modify(|t| {
            *t = Transcript {
                conversation_id,
                ..Default::default()
            };
        });
    }

    pub fn append_user(&self, text: impl Into<String>) -> MessageId {
        self.push(Message::user(text))
    }

    /// Append an empty assistant message and return its id.
    pub fn append_assistant_placeholder(&self) -> MessageId {
        self.push(Message::assistant_placeholder())
    }

    fn push(&self, message: Message) -> MessageId {
        let id = message.id.clone();
        self.inner.send_modify(|t| t.messages.push(message));
        id
    }

    /// Append `fragment` to the message with exactly this id.
    ///
    /// Unknown ids and empty fragments are no-ops. Returns whether the
    /// content changed.
    pub fn apply_token(&self, id: &MessageId, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.inner.send_if_modified(|t| {
            match t.messages.iter_mut().find(|m| &m.id == id) {
                Some(message) => {
                    message.content.push_str(fragment);
                    true
                }
                None => false,
            }
        })
    }

    /// Append the terminal error marker, keeping any partial content.
    pub fn append_error_marker(&self, id: &MessageId) -> bool {
        self.apply_token(id, ERROR_MARKER)
    }

    pub fn snapshot(&self) -> Transcript {
        self.inner.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.borrow().messages.clone()
    }

    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.inner.borrow().messages.iter().find(|m| &m.id == id).cloned()
    }

    pub fn content_of(&self, id: &MessageId) -> Option<String> {
        self.get(id).map(|m| m.content)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.inner.borrow().conversation_id
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<Message> {
        self.inner
            .borrow()
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .cloned()
    }
}
