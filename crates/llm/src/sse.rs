//! Incremental SSE framing.
//!
//! Transport reads land on arbitrary byte boundaries; this splitter keeps a
//! byte buffer across reads, emits complete `data:` payloads, and retains
//! the trailing partial line. Comment and `event:` lines are ignored.

/// Stateful SSE line splitter.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns the `data:` payloads of every
    /// complete line it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                out.push(data.trim_start().to_owned());
            }
        }
        out
    }

    /// Flush whatever is left after the transport closes. A final line
    /// without a trailing LF still counts.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        let line = line.trim_end_matches('\r');
        line.strip_prefix("data:").map(|d| d.trim_start().to_owned())
    }
}
