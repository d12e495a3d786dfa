//! Incremental parser for the gateway's SSE-style chat stream. Network
//! chunks go in, complete `StreamFragment`s come out; the read loop never
//! needs to know about line framing, and tests never need a socket.

use crate::services::ai::StreamFragment;

/// Push-based line parser for `data: <json>` streams terminated by a literal
/// `data: [DONE]`. Bytes are buffered until a full line arrives, so fragments
/// split across network chunks (including mid-UTF-8) reassemble correctly.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    done: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the completion sentinel has been seen; later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a network chunk; returns every fragment completed by it. A
    /// `data:` line that isn't valid JSON fails the whole stream; the caller
    /// treats that as a transport error, not a skippable glitch.
    pub fn push(&mut self, chunk: &[u8]) -> anyhow::Result<Vec<StreamFragment>> {
        if self.done {
            return Ok(vec![]);
        }
        self.buf.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(newline) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            // Blank keep-alives and SSE comments carry nothing.
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.done = true;
                break;
            }

            let fragment: StreamFragment = serde_json::from_str(data)
                .map_err(|e| anyhow::anyhow!("malformed stream fragment: {e}"))?;
            fragments.push(fragment);
        }
        Ok(fragments)
    }
}
