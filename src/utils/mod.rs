//! Utility modules for chatstream
//!
//! Small building blocks shared by the streaming core and the collaborator
//! clients.

pub mod cancel;
pub mod mime;
pub mod utf8_decoder;

pub use cancel::{CancelHandle, make_cancellable_stream, new_cancel_handle};
pub use utf8_decoder::Utf8StreamDecoder;
