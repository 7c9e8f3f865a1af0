//! Reassembles complete JSON object texts from an undelimited byte stream.
//!
//! The backend writes objects back to back (`{..}{..}{..}`) and the transport may cut
//! anywhere, including inside a string literal or an escape sequence. The scanner below
//! tracks brace depth, string state and a pending escape across calls so the result does
//! not depend on where the cuts fall.
//!
//! Scanning works on bytes. `{`, `}`, `"` and `\` are ASCII and never appear inside a
//! multi-byte UTF-8 sequence, so a chunk that splits a code point needs no special care.

use tracing::warn;

/// Default cap on the bytes held for one unterminated object.
pub const DEFAULT_MAX_PARTIAL_BYTES: usize = 4 * 1024 * 1024;

/// Incremental scanner that yields one `String` per complete top-level JSON object.
#[derive(Debug)]
pub struct FrameReconstructor {
    buf: Vec<u8>,
    /// Index in `buf` where the next scan resumes.
    scanned: usize,
    /// Index in `buf` of the current object's opening brace.
    start: usize,
    depth: usize,
    in_string: bool,
    escape: bool,
    max_partial_bytes: usize,
}

impl Default for FrameReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReconstructor {
    /// Creates an empty reconstructor with the default partial-object cap.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            start: 0,
            depth: 0,
            in_string: false,
            escape: false,
            max_partial_bytes: DEFAULT_MAX_PARTIAL_BYTES,
        }
    }

    /// Caps the bytes buffered for one unterminated object.
    ///
    /// An object that grows past the cap (for example a fragment with an unbalanced `{`)
    /// is dropped and scanning restarts with the next chunk.
    pub fn with_max_partial_bytes(mut self, limit: usize) -> Self {
        self.max_partial_bytes = limit;
        self
    }

    /// Appends `chunk` and returns every object completed by it, in arrival order.
    ///
    /// Anything after the last complete object is kept for the next call. Bytes outside
    /// any object (whitespace, stray separators) are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut i = self.scanned;
        while i < self.buf.len() {
            let byte = self.buf[i];
            if self.in_string {
                if self.escape {
                    self.escape = false;
                } else if byte == b'\\' {
                    self.escape = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
            } else {
                match byte {
                    b'"' if self.depth > 0 => self.in_string = true,
                    b'{' => {
                        if self.depth == 0 {
                            self.start = i;
                        }
                        self.depth += 1;
                    }
                    b'}' if self.depth > 0 => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            let text = String::from_utf8_lossy(&self.buf[self.start..=i]);
                            frames.push(text.into_owned());
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        if self.depth == 0 {
            self.buf.clear();
            self.scanned = 0;
            self.start = 0;
        } else {
            self.buf.drain(..self.start);
            self.scanned = self.buf.len();
            self.start = 0;
            if self.buf.len() > self.max_partial_bytes {
                warn!(
                    bytes = self.buf.len(),
                    limit = self.max_partial_bytes,
                    "partial event exceeded size limit; discarding it"
                );
                self.reset();
            }
        }
        frames
    }

    /// Returns `true` when an unterminated object is buffered.
    pub fn has_partial(&self) -> bool {
        self.depth > 0
    }

    /// Number of buffered bytes belonging to the unterminated object.
    pub fn partial_len(&self) -> usize {
        if self.depth > 0 { self.buf.len() } else { 0 }
    }

    /// Drops any buffered partial object and resets the scanner state.
    pub fn reset(&mut self) {
        *self = Self::new().with_max_partial_bytes(self.max_partial_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut reconstructor = FrameReconstructor::new();
        chunks
            .iter()
            .flat_map(|chunk| reconstructor.feed(chunk))
            .collect()
    }

    #[test]
    fn oversized_partial_is_dropped_and_scanning_recovers() {
        let mut reconstructor = FrameReconstructor::new().with_max_partial_bytes(16);
        assert!(reconstructor.feed(br#"{"bad":{"#).is_empty());
        assert!(reconstructor.has_partial());

        // The unbalanced brace swallows this object and pushes the buffer past the cap.
        assert!(reconstructor.feed(br#"{"swallowed":1}"#).is_empty());
        assert!(!reconstructor.has_partial());
        assert_eq!(reconstructor.partial_len(), 0);

        assert_eq!(reconstructor.feed(br#"{"ok":2}"#), vec![r#"{"ok":2}"#]);
    }

    #[test]
    fn reset_keeps_the_configured_cap() {
        let mut reconstructor = FrameReconstructor::new().with_max_partial_bytes(8);
        reconstructor.reset();
        assert!(reconstructor.feed(br#"{"abcdefgh""#).is_empty());
        assert!(!reconstructor.has_partial());
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let mut reconstructor = FrameReconstructor::new();
        assert!(reconstructor.feed(b"").is_empty());
        assert!(!reconstructor.has_partial());
    }

    #[test]
    fn yields_every_object_in_one_chunk_in_order() {
        let frames = feed_all(&[br#"{"a":1}{"b":2} {"c":{"d":3}}"#]);
        assert_eq!(frames, vec![r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":{"d":3}}"#]);
    }

    #[test]
    fn braces_inside_strings_are_not_structural() {
        let frames = feed_all(&[br#"{"content":"a } b { c"}"#]);
        assert_eq!(frames, vec![r#"{"content":"a } b { c"}"#]);
    }

    #[test]
    fn escaped_quote_keeps_string_open() {
        let frames = feed_all(&[br#"{"content":"say \"}\" now"}{"x":1}"#]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], r#"{"content":"say \"}\" now"}"#);
    }

    #[test]
    fn escaped_backslash_before_quote_closes_string() {
        let frames = feed_all(&[br#"{"path":"C:\\"}{"y":2}"#]);
        assert_eq!(frames, vec![r#"{"path":"C:\\"}"#, r#"{"y":2}"#]);
    }

    #[test]
    fn split_inside_escape_sequence_is_reconstructed() {
        let mut reconstructor = FrameReconstructor::new();
        assert!(reconstructor.feed(br#"{"content":"a\"#).is_empty());
        // The escaped quote and brace stay inside the literal.
        assert!(reconstructor.feed(br#""}"#).is_empty());
        let frames = reconstructor.feed(br#"b"}"#);
        assert_eq!(frames, vec![r#"{"content":"a\"}b"}"#]);
    }

    #[test]
    fn object_spanning_three_chunks_is_reconstructed() {
        let frames = feed_all(&[b"{\"event\":\"Run", b"Content\",\"content\":\"{", b"}\"}"]);
        assert_eq!(frames, vec![r#"{"event":"RunContent","content":"{}"}"#]);
    }

    #[test]
    fn retains_partial_object_between_calls() {
        let mut reconstructor = FrameReconstructor::new();
        let first = reconstructor.feed(br#"{"a":1}{"b":"#);
        assert_eq!(first, vec![r#"{"a":1}"#]);
        assert!(reconstructor.has_partial());
        assert_eq!(reconstructor.partial_len(), r#"{"b":"#.len());

        let second = reconstructor.feed(b"2}");
        assert_eq!(second, vec![r#"{"b":2}"#]);
        assert!(!reconstructor.has_partial());
    }

    #[test]
    fn multibyte_characters_split_across_chunks_survive() {
        let text = "{\"content\":\"olá 👋\"}".as_bytes();
        let (head, tail) = text.split_at(15);
        let frames = feed_all(&[head, tail]);
        assert_eq!(frames, vec!["{\"content\":\"olá 👋\"}"]);
    }

    #[test]
    fn every_byte_partition_matches_single_chunk() {
        let stream = br#"{"event":"RunStarted","agent_name":"Ana"}{"event":"RunContent","content":"x \"}{\" y\\"}{"event":"RunCompleted"}"#;
        let whole = feed_all(&[stream]);
        assert_eq!(whole.len(), 3);

        for size in 1..stream.len() {
            let chunks: Vec<&[u8]> = stream.chunks(size).collect();
            assert_eq!(feed_all(&chunks), whole, "chunk size {size}");
        }
        for cut in 1..stream.len() {
            let (a, b) = stream.split_at(cut);
            assert_eq!(feed_all(&[a, b]), whole, "cut at {cut}");
        }
    }

    #[test]
    fn reset_discards_partial_state() {
        let mut reconstructor = FrameReconstructor::new();
        reconstructor.feed(br#"{"content":"open"#);
        reconstructor.reset();
        assert!(!reconstructor.has_partial());
        assert_eq!(reconstructor.feed(br#"{"a":1}"#), vec![r#"{"a":1}"#]);
    }
}
