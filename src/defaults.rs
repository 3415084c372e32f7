//! Default Configuration Values
//!
//! Centralizes the defaults used throughout chatstream so they can be
//! documented and adjusted in one place.

use std::time::Duration;

/// HTTP client defaults
pub mod http {
    use super::*;

    /// Backend used when neither configuration nor environment names one.
    pub const BACKEND_URL: &str = "http://localhost:8080";

    /// Environment variables consulted (in order) for the backend base URL.
    pub const BACKEND_URL_ENV: &[&str] = &["CHATSTREAM_BACKEND_URL", "BACKEND_URL"];

    /// Environment toggle for `Accept-Encoding: identity` on streaming requests.
    pub const STREAM_DISABLE_COMPRESSION_ENV: &str = "CHATSTREAM_STREAM_DISABLE_COMPRESSION";

    /// Connection timeout.
    ///
    /// There is no default total request timeout: a streamed answer can take
    /// minutes and is bounded by cancellation instead.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default User-Agent string
    pub const USER_AGENT: &str = concat!("chatstream/", env!("CARGO_PKG_VERSION"));
}

/// Event stream framing
pub mod stream {
    /// Prefix of a payload-carrying line.
    pub const DATA_PREFIX: &str = "data:";

    /// Blank line separating two frames.
    pub const FRAME_DELIMITER: &str = "\n\n";

    /// Payload that terminates the stream. Compared after trimming.
    pub const DONE_SENTINEL: &str = "[DONE]";

    /// Appended to an assistant message whose stream failed.
    pub const ERROR_MARKER: &str = "\n[Error receiving response]";
}

/// Image attachment limits
pub mod images {
    /// Content types accepted for multimodal sends.
    pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

    /// Maximum size of a single image (5 MiB).
    pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

    /// User message content when only images are sent.
    pub const IMAGE_ONLY_PLACEHOLDER: &str = "[image]";

    pub const DISALLOWED_TYPE_MESSAGE: &str = "Only JPG, PNG, or WEBP images are allowed.";
    pub const TOO_LARGE_MESSAGE: &str = "Each image must be under 5MB.";
}
