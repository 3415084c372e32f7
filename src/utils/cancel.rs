//! Cancellation utilities
//!
//! Provides first-class cancellation handles for streams and in-flight
//! exchanges.

use futures_util::Stream;
use std::pin::Pin;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request cancellation. Observers stop at their next suspension point;
    /// dropping the response body then closes the HTTP connection so the
    /// backend stops generating.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Make a stream cancellable and return its cancel handle.
///
/// The wrapper ends the stream as soon as cancellation is requested, even
/// while the inner stream is pending.
pub fn make_cancellable_stream<T>(
    stream: Pin<Box<dyn Stream<Item = T> + Send>>,
) -> (Pin<Box<dyn Stream<Item = T> + Send>>, CancelHandle)
where
    T: Send + 'static,
{
    let handle = new_cancel_handle();
    let token = handle.token.clone();
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures_util::StreamExt;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = inner.next() => item,
            };
            match next {
                Some(item) => yield item,
                None => break,
            }
        }
    };
    (Box::pin(s), handle)
}

/// Create a standalone cancel handle that can be shared across tasks.
pub fn new_cancel_handle() -> CancelHandle {
    CancelHandle::new(CancellationToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn clones_share_the_signal() {
        let handle = new_cancel_handle();
        let other = handle.clone();
        assert!(!other.is_cancelled());
        handle.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_ends_a_pending_stream() {
        let pending: Pin<Box<dyn Stream<Item = u8> + Send>> =
            Box::pin(futures_util::stream::iter(vec![1u8]).chain(futures_util::stream::pending()));
        let (mut stream, handle) = make_cancellable_stream(pending);

        assert_eq!(stream.next().await, Some(1));
        handle.cancel();
        assert_eq!(stream.next().await, None);
    }
}
