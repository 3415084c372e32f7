//! Shared data types.

mod conversation;
mod message;

pub use conversation::{Conversation, ConversationId, Document};
pub use message::{Message, MessageId, Role};
