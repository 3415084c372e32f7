//! Stream session: one in-flight chat exchange.
//!
//! The session opens the exchange through a [`ChatTransport`], reads the body
//! chunk by chunk, and appends every decoded payload to its target assistant
//! message as soon as it is parsed. The whole exchange runs inside the
//! `open` future, so chunk processing never interleaves: one chunk and all
//! payloads derived from it are applied before the next read is awaited.
//!
//! Awaiting the response and awaiting each chunk both race the cancel
//! handle. Cancellation ends the session with [`StreamOutcome::Cancelled`]
//! and keeps whatever content was already applied. Any other failure appends
//! the error marker to the message before the error is returned.

use super::frame::FrameParser;
use crate::error::{ChatError, Result};
use crate::store::ConversationStore;
use crate::transport::{ChatRequest, ChatTransport};
use crate::types::MessageId;
use crate::utils::{CancelHandle, Utf8StreamDecoder, new_cancel_handle};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::Instrument;

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body was read to the end.
    Completed { fragments: usize },
    /// `stop()` aborted the exchange; content so far is final.
    Cancelled { fragments: usize },
}

impl StreamOutcome {
    pub fn fragments(&self) -> usize {
        match self {
            StreamOutcome::Completed { fragments } | StreamOutcome::Cancelled { fragments } => {
                *fragments
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled { .. })
    }
}

pub struct StreamSession {
    transport: Arc<dyn ChatTransport>,
    store: ConversationStore,
    target: MessageId,
    cancel: CancelHandle,
}

impl StreamSession {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: ConversationStore,
        target: MessageId,
    ) -> Self {
        Self::with_cancel(transport, store, target, new_cancel_handle())
    }

    /// Use an existing cancel handle, e.g. one registered before the session
    /// was created.
    pub fn with_cancel(
        transport: Arc<dyn ChatTransport>,
        store: ConversationStore,
        target: MessageId,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            transport,
            store,
            target,
            cancel,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn target(&self) -> &MessageId {
        &self.target
    }

    /// Abort the exchange. Takes effect at the next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run the exchange to completion, cancellation, or failure.
    pub async fn open(self, request: ChatRequest) -> Result<StreamOutcome> {
        let span = tracing::info_span!(
            "stream_session",
            message_id = %self.target,
            conversation_id = ?request.conversation_id(),
        );
        async move {
            match self.drive(&request).await {
                Ok(outcome) => {
                    tracing::info!(
                        fragments = outcome.fragments(),
                        cancelled = outcome.is_cancelled(),
                        "stream finished"
                    );
                    Ok(outcome)
                }
                Err(err) => Err(self.fail(err)),
            }
        }
        .instrument(span)
        .await
    }

    /// Mark the target message as failed and hand the error back.
    pub(crate) fn fail(&self, err: ChatError) -> ChatError {
        tracing::warn!(error = %err, message_id = %self.target, "stream failed");
        self.store.append_error_marker(&self.target);
        err
    }

    async fn drive(&self, request: &ChatRequest) -> Result<StreamOutcome> {
        let mut body = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("cancelled before response");
                return Ok(StreamOutcome::Cancelled { fragments: 0 });
            }
            opened = self.transport.open_stream(request) => opened?,
        };

        let mut decoder = Utf8StreamDecoder::new();
        let mut parser = FrameParser::new();
        let mut fragments = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(fragments, "cancelled mid-stream");
                    return Ok(StreamOutcome::Cancelled { fragments });
                }
                chunk = body.next() => chunk,
            };
            match next {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(&bytes);
                    fragments += self.apply(parser.push(&text));
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        let tail = decoder.flush();
        let mut rest = parser.push(&tail);
        rest.extend(parser.finish());
        fragments += self.apply(rest);

        if !parser.saw_done() {
            tracing::debug!(framing = ?parser.framing(), "body ended without done sentinel");
        }
        Ok(StreamOutcome::Completed { fragments })
    }

    fn apply(&self, payloads: Vec<String>) -> usize {
        payloads
            .iter()
            .filter(|payload| self.store.apply_token(&self.target, payload))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// Replays a fixed body; `hang` keeps the stream open afterwards.
    struct Scripted {
        chunks: Vec<Result<&'static str>>,
        hang: bool,
        requests: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(chunks: Vec<Result<&'static str>>) -> Self {
            Self {
                chunks,
                hang: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }
    }

    #[async_trait]
    impl ChatTransport for Scripted {
        async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
            self.requests.lock().unwrap().push(request.path());
            let items: Vec<Result<Bytes>> = self
                .chunks
                .iter()
                .map(|c| c.clone().map(|s| Bytes::from_static(s.as_bytes())))
                .collect();
            let body = futures_util::stream::iter(items);
            if self.hang {
                Ok(Box::pin(body.chain(futures_util::stream::pending())))
            } else {
                Ok(Box::pin(body))
            }
        }
    }

    struct Failing(ChatError);

    #[async_trait]
    impl ChatTransport for Failing {
        async fn open_stream(&self, _request: &ChatRequest) -> Result<ByteStream> {
            Err(self.0.clone())
        }
    }

    fn session(transport: Arc<dyn ChatTransport>) -> (StreamSession, ConversationStore, MessageId) {
        let store = ConversationStore::new();
        let id = store.append_assistant_placeholder();
        (StreamSession::new(transport, store.clone(), id.clone()), store, id)
    }

    #[tokio::test]
    async fn applies_framed_payloads_in_order() {
        let transport = Arc::new(Scripted::new(vec![
            Ok("data: Hel\n\n"),
            Ok("data:lo\n\n"),
            Ok("data: [DONE]\n\n"),
        ]));
        let (session, store, id) = session(transport.clone());

        let outcome = session.open(ChatRequest::text(Some(3), "hi")).await.unwrap();
        assert_eq!(outcome, StreamOutcome::Completed { fragments: 2 });
        assert_eq!(store.content_of(&id).as_deref(), Some(" Hello"));
        assert_eq!(*transport.requests.lock().unwrap(), vec!["/api/chat/3/messages"]);
    }

    #[tokio::test]
    async fn raw_body_is_appended_verbatim() {
        let transport = Arc::new(Scripted::new(vec![Ok("Plain "), Ok("text reply")]));
        let (session, store, id) = session(transport);

        session.open(ChatRequest::text(None, "hi")).await.unwrap();
        assert_eq!(store.content_of(&id).as_deref(), Some("Plain text reply"));
    }

    #[tokio::test]
    async fn request_failure_appends_marker() {
        let (session, store, id) = session(Arc::new(Failing(ChatError::RequestFailed {
            status: 500,
        })));

        let err = session.open(ChatRequest::text(None, "hi")).await.unwrap_err();
        assert_eq!(err, ChatError::RequestFailed { status: 500 });
        assert_eq!(
            store.content_of(&id).as_deref(),
            Some("\n[Error receiving response]")
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failure_is_logged_with_the_target_message() {
        let (session, _store, id) = session(Arc::new(Failing(ChatError::MissingBody)));

        session.open(ChatRequest::text(None, "hi")).await.unwrap_err();
        assert!(logs_contain("stream failed"));
        assert!(logs_contain(id.as_str()));
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_content() {
        let transport = Arc::new(Scripted::new(vec![
            Ok("data: Hello, \n\n"),
            Err(ChatError::Stream("connection reset".into())),
        ]));
        let (session, store, id) = session(transport);

        let err = session.open(ChatRequest::text(None, "hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::Stream(_)));
        assert_eq!(
            store.content_of(&id).as_deref(),
            Some(" Hello, \n[Error receiving response]")
        );
    }

    #[tokio::test]
    async fn stop_before_response_leaves_message_empty() {
        let transport = Arc::new(Scripted::new(vec![Ok("data: never\n\n")]));
        let (session, store, id) = session(transport.clone());

        session.stop();
        let outcome = session.open(ChatRequest::text(None, "hi")).await.unwrap();
        assert_eq!(outcome, StreamOutcome::Cancelled { fragments: 0 });
        assert_eq!(store.content_of(&id).as_deref(), Some(""));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_mid_stream_keeps_partial_without_marker() {
        let transport = Arc::new(Scripted::new(vec![Ok("data: partial\n\n")]).hanging());
        let (session, store, id) = session(transport);
        let handle = session.cancel_handle();

        let mut rx = store.subscribe();
        let task = tokio::spawn(session.open(ChatRequest::text(None, "hi")));

        rx.wait_for(|t| t.messages.iter().any(|m| m.content == " partial"))
            .await
            .unwrap();
        handle.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, StreamOutcome::Cancelled { fragments: 1 });
        assert_eq!(store.content_of(&id).as_deref(), Some(" partial"));
    }

    #[tokio::test]
    async fn empty_payloads_are_not_counted() {
        let transport = Arc::new(Scripted::new(vec![Ok("data:\n\ndata:x\n\n")]));
        let (session, store, id) = session(transport);

        let outcome = session.open(ChatRequest::text(None, "hi")).await.unwrap();
        assert_eq!(outcome.fragments(), 1);
        assert_eq!(store.content_of(&id).as_deref(), Some("x"));
    }
}
