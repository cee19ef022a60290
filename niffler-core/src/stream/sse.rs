//! Minimal SSE line decoder.
//!
//! Providers frame one event as consecutive `field: value` lines terminated
//! by a blank line. We decode incrementally so chunks that split a frame (or
//! even a single line) across network reads still produce complete frames —
//! the decoder buffers the tail until a full line (and then a full frame) is
//! available. Lines starting with `:` are comments/heartbeats and are
//! dropped without producing a frame (spec §4.3 point 6).

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Default)]
pub struct SseDecoder {
    buf: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of raw bytes (already UTF-8 decoded) and returns any
    /// complete frames it produced. Incomplete trailing lines are retained
    /// for the next call.
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buf.push_str(chunk);
        let mut frames = Vec::new();
        loop {
            match self.buf.find('\n') {
                None => break,
                Some(pos) => {
                    let line: String = self.buf.drain(..=pos).collect();
                    let line = line.trim_end_matches(['\n', '\r']);
                    if let Some(frame) = self.feed_line(line) {
                        frames.push(frame);
                    }
                }
            }
        }
        frames
    }

    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(rest) = line.strip_prefix(':') {
            let _ = rest; // comment/heartbeat
            return None;
        }
        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.trim_start().to_string());
        }
        // Unknown fields (id:, retry:) are tolerated and ignored.
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let frame = SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(frame)
    }

    /// Flushes any buffered-but-undispatched frame at stream end (a
    /// well-formed stream always ends with a blank line, but tolerate one
    /// that doesn't).
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.dispatch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_event_and_data_lines() {
        let mut d = SseDecoder::new();
        let frames = d.push("event: content_block_delta\ndata: {\"a\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[test]
    fn handles_frame_split_across_pushes() {
        let mut d = SseDecoder::new();
        let mut frames = d.push("event: foo\ndata: {\"a\"");
        assert!(frames.is_empty());
        frames = d.push(":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[test]
    fn skips_comment_lines() {
        let mut d = SseDecoder::new();
        let frames = d.push(": keepalive\n\nevent: x\ndata: y\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("x"));
    }

    #[test]
    fn joins_multiple_data_lines_with_newline() {
        let mut d = SseDecoder::new();
        let frames = d.push("data: line1\ndata: line2\n\n");
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn data_only_frame_has_no_event() {
        let mut d = SseDecoder::new();
        let frames = d.push("data: {\"x\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].event.is_none());
    }
}
