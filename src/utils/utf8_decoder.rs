//! Incremental UTF-8 decoding for byte streams.
//!
//! Network chunks can split a multi-byte character. The decoder keeps the
//! incomplete tail until the next chunk completes it; invalid sequences are
//! replaced with U+FFFD instead of failing the stream.

/// Stateful UTF-8 decoder for chunked input.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, holding back a trailing incomplete character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_up_to]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_up_to + len;
                        }
                        None => {
                            start = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush whatever is left at end of stream.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_split_multibyte_characters() {
        let bytes = "héllo 👋".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        out.push_str(&decoder.flush());
        assert_eq!(out, "héllo 👋");
    }

    #[test]
    fn holds_incomplete_tail() {
        let wave = "👋".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&wave[..2]), "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&wave[2..]), "👋");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn replaces_invalid_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn flush_emits_truncated_tail_lossily() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&"é".as_bytes()[..1]), "");
        assert_eq!(decoder.flush(), "\u{FFFD}");
        assert_eq!(decoder.flush(), "");
    }
}
