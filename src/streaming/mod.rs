//! Streaming response consumption.
//!
//! - [`frame`]: event-frame parsing with raw-text fallback
//! - [`session`]: one in-flight exchange applied to the conversation store
//!
//! [`stream_fragments`] exposes the same pipeline without a store, for
//! callers that want the text fragments directly.

pub mod frame;
pub mod session;

pub use frame::{FragmentStream, FrameParser, Framing, parse_text_stream};
pub use session::{StreamOutcome, StreamSession};

use crate::error::Result;
use crate::transport::{ChatRequest, ChatTransport};
use crate::utils::{CancelHandle, make_cancellable_stream};

/// Open `request` and return its payloads as a cancellable stream.
pub async fn stream_fragments(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
) -> Result<(FragmentStream, CancelHandle)> {
    let body = transport.open_stream(request).await?;
    Ok(make_cancellable_stream(parse_text_stream(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::transport::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::StreamExt;

    struct Endless;

    #[async_trait]
    impl ChatTransport for Endless {
        async fn open_stream(&self, _request: &ChatRequest) -> Result<ByteStream> {
            let first: Vec<std::result::Result<Bytes, ChatError>> =
                vec![Ok(Bytes::from_static(b"data: one\n\ndata: two\n\n"))];
            Ok(Box::pin(
                futures_util::stream::iter(first).chain(futures_util::stream::pending()),
            ))
        }
    }

    #[tokio::test]
    async fn fragments_stop_on_cancel() {
        let (mut fragments, cancel) = stream_fragments(&Endless, &ChatRequest::text(None, "hi"))
            .await
            .unwrap();

        assert_eq!(fragments.next().await, Some(Ok(" one".to_string())));
        assert_eq!(fragments.next().await, Some(Ok(" two".to_string())));
        cancel.cancel();
        assert_eq!(fragments.next().await, None);
    }
}
