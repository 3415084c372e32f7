//! Error Handling Module
//!
//! - Core error type (`ChatError`) and its coarse `ErrorCategory`
//! - Conversions from the HTTP and JSON error types used by the client
//!
//! # Example
//!
//! ```rust,ignore
//! use chatstream::error::{ChatError, ErrorCategory};
//!
//! let error = ChatError::RequestFailed { status: 502 };
//! assert_eq!(error.category(), ErrorCategory::Server);
//! ```

mod conversions;
pub mod types;

pub use types::*;
