//! # chatstream
//!
//! Client for chat backends that stream assistant answers as server-sent
//! events or as raw incremental text.
//!
//! ## Overview
//!
//! - [`store::ConversationStore`]: observable message list of the active
//!   conversation
//! - [`orchestrator::ChatController`]: send, send with images, stop
//! - [`streaming`]: frame parser and stream session
//! - [`transport`]: the HTTP seam, replaceable for tests
//! - [`api::RecordsClient`]: conversation and document records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatstream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:8080").build()?;
//!     let chat = ChatController::new(config)?.for_conversation(42);
//!
//!     let mut updates = chat.store().subscribe();
//!     tokio::spawn(async move {
//!         while updates.changed().await.is_ok() {
//!             if let Some(last) = updates.borrow_and_update().messages.last() {
//!                 println!("{}", last.content);
//!             }
//!         }
//!     });
//!
//!     chat.send("Hello!").await?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod api;
pub mod attachments;
pub mod config;
pub mod defaults;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod store;
pub mod streaming;
pub mod transport;
pub mod types;
pub mod utils;

pub use error::{ChatError, Result};

pub mod prelude {
    pub use crate::api::RecordsClient;
    pub use crate::attachments::{ImageAttachment, PendingAttachments, PreviewRegistry};
    pub use crate::config::ClientConfig;
    pub use crate::error::{ChatError, ErrorCategory};
    pub use crate::orchestrator::{ChatController, IgnoreReason, SendOutcome};
    pub use crate::store::{ConversationStore, Transcript};
    pub use crate::streaming::{FrameParser, StreamOutcome, StreamSession, stream_fragments};
    pub use crate::transport::{ChatRequest, ChatTransport, HttpTransport};
    pub use crate::types::{Conversation, ConversationId, Message, MessageId, Role};
    pub use crate::utils::CancelHandle;
}
