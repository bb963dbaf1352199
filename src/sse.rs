//! Line framing for `text/event-stream` and newline-delimited JSON bodies.
//!
//! Network chunks do not respect line boundaries, so both the provider
//! parsers and the relay client feed raw bytes through [`SseLineBuffer`] and
//! only ever look at complete lines.

/// Accumulates raw body chunks and hands back complete lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every line terminated within it.
    ///
    /// Trailing `\r` is stripped. Bytes after the last `\n` stay buffered, so
    /// a multi-byte character split across two chunks is decoded whole.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim_end_matches('\r');
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Extracts the payload of a `data:` field line.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
