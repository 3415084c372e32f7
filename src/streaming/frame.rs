//! Event frame parsing.
//!
//! Backends answer either with an event stream (`data:` lines, frames
//! separated by a blank line) or with raw incremental text. [`FrameParser`]
//! handles both: it is fed decoded text chunks and returns the text payloads
//! that became complete.
//!
//! Framing is decided once per response. A `data:` prefix at the start of a
//! line switches the parser to framed mode for the rest of the response;
//! text that cannot be the start of an event stream switches it to raw mode,
//! in which every chunk is passed through untouched. Only blank lines, event
//! field lines and a partial field name are held back while undecided. A `data:` that shows up
//! mid-line in a raw response is therefore plain text.

use crate::defaults::stream::{DATA_PREFIX, DONE_SENTINEL, FRAME_DELIMITER};
use crate::error::ChatError;
use crate::utils::Utf8StreamDecoder;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

/// Field prefixes that may open an event stream before any `data:` line.
const EVENT_FIELD_PREFIXES: &[&str] = &[DATA_PREFIX, "event:", "id:", "retry:", ":"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Nothing conclusive seen yet.
    Undetermined,
    /// Event stream with `data:` frames.
    Framed,
    /// Raw text passthrough.
    Raw,
}

/// Incremental parser turning text chunks into payloads.
#[derive(Debug)]
pub struct FrameParser {
    buffer: String,
    framing: Framing,
    saw_done: bool,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            framing: Framing::Undetermined,
            saw_done: false,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Whether the end-of-stream sentinel has been received.
    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    /// Feed a decoded chunk and collect the payloads it completed, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        if self.framing == Framing::Undetermined {
            if has_line_start_marker(&self.buffer) {
                self.framing = Framing::Framed;
            } else if !could_open_event_stream(&self.buffer) {
                self.framing = Framing::Raw;
            }
        }

        match self.framing {
            Framing::Framed => self.drain_frames(),
            Framing::Raw => {
                if self.buffer.is_empty() {
                    Vec::new()
                } else {
                    vec![std::mem::take(&mut self.buffer)]
                }
            }
            Framing::Undetermined => Vec::new(),
        }
    }

    /// Signal end of input.
    ///
    /// Text held back while the framing was undetermined is released as a raw
    /// payload. An unterminated trailing frame is dropped.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        match self.framing {
            Framing::Undetermined if !rest.is_empty() => {
                self.framing = Framing::Raw;
                vec![rest]
            }
            Framing::Framed if !rest.trim().is_empty() => {
                tracing::debug!(
                    bytes = rest.len(),
                    "discarding unterminated trailing frame"
                );
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn drain_frames(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..pos];
            match parse_frame(frame) {
                FramePayload::Text(text) => payloads.push(text),
                FramePayload::Done => self.saw_done = true,
                FramePayload::Empty => {}
            }
        }
        payloads
    }
}

#[derive(Debug, PartialEq, Eq)]
enum FramePayload {
    Text(String),
    Done,
    Empty,
}

/// Join the `data:` lines of one frame. Text after the prefix is kept verbatim.
fn parse_frame(frame: &str) -> FramePayload {
    let lines: Vec<&str> = frame
        .split('\n')
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .collect();
    if lines.is_empty() {
        return FramePayload::Empty;
    }
    let combined = lines.join("\n");
    if combined.trim() == DONE_SENTINEL {
        return FramePayload::Done;
    }
    FramePayload::Text(combined)
}

fn has_line_start_marker(buffer: &str) -> bool {
    buffer.split('\n').any(|line| line.starts_with(DATA_PREFIX))
}

/// True while the buffer may still be the opening of an event stream.
///
/// Complete lines must be blank or carry an event field. The unfinished
/// last line is only held while it is shorter than a field name it could
/// become, so text such as `:) sure` or `id: 4` without a newline is
/// released straight away.
fn could_open_event_stream(buffer: &str) -> bool {
    let (complete, partial) = match buffer.rfind('\n') {
        Some(pos) => (&buffer[..pos], &buffer[pos + 1..]),
        None => ("", buffer),
    };
    let complete_ok = complete.is_empty()
        || complete.split('\n').all(|line| {
            line.is_empty()
                || EVENT_FIELD_PREFIXES
                    .iter()
                    .any(|field| line.starts_with(field))
        });
    let partial_ok = partial.is_empty()
        || EVENT_FIELD_PREFIXES
            .iter()
            .any(|field| field.len() > partial.len() && field.starts_with(partial));
    complete_ok && partial_ok
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Adapt a response byte stream into a stream of text payloads.
///
/// Empty payloads are skipped. A body error is yielded once and ends the
/// stream.
pub fn parse_text_stream<S, B>(byte_stream: S) -> FragmentStream
where
    S: Stream<Item = Result<B, ChatError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let out = async_stream::stream! {
        let mut bytes = byte_stream;
        let mut decoder = Utf8StreamDecoder::new();
        let mut parser = FrameParser::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let text = decoder.decode(chunk.as_ref());
            for payload in parser.push(&text) {
                if !payload.is_empty() {
                    yield Ok(payload);
                }
            }
        }

        let tail = decoder.flush();
        let mut rest = parser.push(&tail);
        rest.extend(parser.finish());
        for payload in rest {
            if !payload.is_empty() {
                yield Ok(payload);
            }
        }
    };
    Box::pin(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&str]) -> (Vec<String>, FrameParser) {
        let mut parser = FrameParser::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(parser.push(chunk));
        }
        out.extend(parser.finish());
        (out, parser)
    }

    #[test]
    fn preserves_character_after_prefix() {
        let (out, parser) = feed(&["data: Hel\n\n", "data:lo\n\n", "data: [DONE]\n\n"]);
        assert_eq!(out, vec![" Hel".to_string(), "lo".to_string()]);
        assert_eq!(out.concat(), " Hello");
        assert!(parser.saw_done());
        assert_eq!(parser.framing(), Framing::Framed);
    }

    #[test]
    fn joins_multi_line_frames_with_newline() {
        let (out, _) = feed(&["data: line one\ndata: line two\n\n"]);
        assert_eq!(out, vec![" line one\n line two".to_string()]);
    }

    #[test]
    fn frames_split_across_chunks() {
        let (out, _) = feed(&["data: a", "bc\nda", "ta: d\n", "\ndata:e\n\n"]);
        assert_eq!(out, vec![" abc\n d".to_string(), "e".to_string()]);
    }

    #[test]
    fn chunk_boundaries_do_not_change_payloads() {
        let body = "data: The\n\ndata: quick\ndata: brown\n\nevent: ping\n\ndata: fox\n\ndata: [DONE]\n\n";
        let (whole, _) = feed(&[body]);
        for split in 1..body.len() {
            let (a, b) = body.split_at(split);
            let (parts, _) = feed(&[a, b]);
            assert_eq!(parts, whole, "split at {split}");
        }
        assert_eq!(whole.concat(), " The quick\n brown fox");
    }

    #[test]
    fn sentinel_is_never_yielded() {
        let (out, parser) = feed(&["data:  [DONE]  \n\n"]);
        assert!(out.is_empty());
        assert!(parser.saw_done());
    }

    #[test]
    fn empty_data_line_is_an_empty_payload() {
        let (out, _) = feed(&["data:\n\n", "data: x\n\n"]);
        assert_eq!(out, vec![String::new(), " x".to_string()]);
    }

    #[test]
    fn frames_without_data_lines_yield_nothing() {
        let (out, _) = feed(&[": keep-alive\n\nevent: start\nid: 1\n\n", "data: hi\n\n"]);
        assert_eq!(out, vec![" hi".to_string()]);
    }

    #[test]
    fn raw_text_passes_through_per_chunk() {
        let (out, parser) = feed(&["Hello", ", wor", "ld\n\nbye"]);
        assert_eq!(out.concat(), "Hello, world\n\nbye");
        assert_eq!(out.len(), 3);
        assert_eq!(parser.framing(), Framing::Raw);
    }

    #[test]
    fn single_raw_chunk_is_a_single_payload() {
        let (out, _) = feed(&["Plain answer."]);
        assert_eq!(out, vec!["Plain answer.".to_string()]);
    }

    #[test]
    fn mid_line_marker_in_raw_text_stays_text() {
        let (out, parser) = feed(&["Send it as data: ", "base64\ndata: not a frame"]);
        assert_eq!(out.concat(), "Send it as data: base64\ndata: not a frame");
        assert_eq!(parser.framing(), Framing::Raw);
    }

    #[test]
    fn short_ambiguous_prefix_is_held_then_released() {
        let mut parser = FrameParser::new();
        assert!(parser.push("da").is_empty());
        assert_eq!(parser.framing(), Framing::Undetermined);
        assert_eq!(parser.finish(), vec!["da".to_string()]);
    }

    #[test]
    fn raw_reply_starting_like_a_field_is_released_at_once() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.push(":) sure"), vec![":) sure".to_string()]);
        assert_eq!(parser.push(", here is"), vec![", here is".to_string()]);
        assert_eq!(parser.framing(), Framing::Raw);

        let mut parser = FrameParser::new();
        assert_eq!(parser.push("id: 4 is"), vec!["id: 4 is".to_string()]);
    }

    #[test]
    fn comment_preamble_is_held_until_the_first_frame() {
        let mut parser = FrameParser::new();
        assert!(parser.push(": ping\n\nev").is_empty());
        assert_eq!(parser.framing(), Framing::Undetermined);
        assert_eq!(
            parser.push("ent: start\ndata: go\n\n"),
            vec![" go".to_string()]
        );
        assert_eq!(parser.framing(), Framing::Framed);
    }

    #[test]
    fn prefix_split_across_first_chunks_is_framed() {
        let (out, _) = feed(&["da", "ta: ok\n\n"]);
        assert_eq!(out, vec![" ok".to_string()]);
    }

    #[test]
    fn unterminated_trailing_frame_is_dropped() {
        let (out, _) = feed(&["data: kept\n\ndata: lost"]);
        assert_eq!(out, vec![" kept".to_string()]);
    }

    #[tokio::test]
    async fn parse_text_stream_yields_payloads_across_utf8_splits() {
        let body = "data: héllo\n\ndata: wörld\n\ndata: [DONE]\n\n".as_bytes().to_vec();
        let chunks: Vec<Result<Vec<u8>, ChatError>> =
            body.chunks(3).map(|c| Ok(c.to_vec())).collect();

        let mut stream = parse_text_stream(futures_util::stream::iter(chunks));
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.unwrap());
        }
        assert_eq!(out, vec![" héllo".to_string(), " wörld".to_string()]);
    }

    #[tokio::test]
    async fn parse_text_stream_stops_at_body_error() {
        let chunks: Vec<Result<&[u8], ChatError>> = vec![
            Ok(b"data: a\n\n".as_slice()),
            Err(ChatError::Stream("connection reset".into())),
            Ok(b"data: b\n\n".as_slice()),
        ];
        let mut stream = parse_text_stream(futures_util::stream::iter(chunks));
        assert_eq!(stream.next().await, Some(Ok(" a".to_string())));
        assert!(matches!(stream.next().await, Some(Err(ChatError::Stream(_)))));
        assert_eq!(stream.next().await, None);
    }
}
