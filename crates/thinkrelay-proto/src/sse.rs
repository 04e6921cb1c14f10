//! Incremental `text/event-stream` decoding.
//!
//! Network reads split the stream at arbitrary byte offsets, including inside
//! a line or a multi-byte UTF-8 character. [`SseDecoder`] buffers raw bytes
//! until a full line is available, so callers can feed whatever chunk they
//! received and collect the frames it completes.

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the frame carried one.
    pub event: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    event: Option<String>,
    data: String,
    has_data: bool,
    /// Last terminator was `\r`; a directly following `\n` belongs to it.
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(frame) = self.process_line(&line) {
                        frames.push(frame);
                    }
                }
                _ => self.line.push(byte),
            }
        }
        frames
    }

    /// Flush a trailing frame whose terminating blank line never arrived.
    ///
    /// Strict SSE consumers discard such a frame at end of stream; call this
    /// only where a peer is known to close without the final blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.line);
        if !line.is_empty()
            && let Some(frame) = self.process_line(&line)
        {
            return Some(frame);
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        let line = String::from_utf8_lossy(line);
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };
        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_owned()),
            // `id` and `retry` carry nothing the relay uses.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if !std::mem::take(&mut self.has_data) {
            return None;
        }
        Some(SseFrame { event, data: std::mem::take(&mut self.data) })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn data_of(frames: &[SseFrame]) -> Vec<&str> {
        frames.iter().map(|f| f.data.as_str()).collect()
    }

    #[test]
    fn decodes_simple_frames() {
        let mut dec = SseDecoder::new();
        let frames = dec.feed(b"data: <think>\n\ndata: hello\n\n");
        assert_eq!(data_of(&frames), ["<think>", "hello"]);
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"da").is_empty());
        assert!(dec.feed(b"ta: par").is_empty());
        assert!(dec.feed(b"tial\n").is_empty());
        let frames = dec.feed(b"\n");
        assert_eq!(data_of(&frames), ["partial"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let bytes = "data: 中文\n\n".as_bytes();
        let mut dec = SseDecoder::new();
        assert!(dec.feed(&bytes[..8]).is_empty());
        let frames = dec.feed(&bytes[8..]);
        assert_eq!(data_of(&frames), ["中文"]);
    }

    #[test]
    fn crlf_and_cr_terminators() {
        let mut dec = SseDecoder::new();
        let frames = dec.feed(b"data: a\r\n\r\ndata: b\r\rdata: c\r");
        assert_eq!(data_of(&frames), ["a", "b"]);
        let frames = dec.feed(b"\n\r\n");
        assert_eq!(data_of(&frames), ["c"]);
    }

    #[test]
    fn comments_are_ignored_and_data_lines_joined() {
        let mut dec = SseDecoder::new();
        let frames = dec.feed(b": keep-alive\n\ndata: one\ndata:two\n\n");
        assert_eq!(data_of(&frames), ["one\ntwo"]);
    }

    #[test]
    fn event_field_is_reported() {
        let mut dec = SseDecoder::new();
        let frames = dec.feed(b"event: error\ndata: boom\n\ndata: plain\n\n");
        assert_eq!(frames[0].event.as_deref(), Some("error"));
        assert_eq!(frames[1].event, None);
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: tail").is_empty());
        assert_eq!(dec.finish().map(|f| f.data), Some("tail".to_owned()));
        assert_eq!(dec.finish(), None);
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_frames(
            payloads in proptest::collection::vec("[^\r\n]{0,12}", 1..6),
            split in 0usize..200,
        ) {
            let wire: String = payloads.iter().map(|p| format!("data: {p}\n\n")).collect();
            let bytes = wire.as_bytes();
            let split = split.min(bytes.len());

            let mut whole = SseDecoder::new();
            let expected = whole.feed(bytes);

            let mut parts = SseDecoder::new();
            let mut got = parts.feed(&bytes[..split]);
            got.extend(parts.feed(&bytes[split..]));

            prop_assert_eq!(got, expected);
        }
    }
}
