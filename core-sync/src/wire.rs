//! Newline-delimited JSON framing for [`SyncEvent`]s.
//!
//! One event per line, UTF-8, `\n` terminated. Blank lines are ignored and a
//! trailing `\r` is tolerated. Framing is independent of how the bytes
//! arrive: chunks may split a line anywhere, including inside a multi-byte
//! character.

use crate::error::{Result, SyncError};
use crate::event::SyncEvent;
use bytes::Bytes;

/// Content type of a streaming sync response.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Encode one event as a complete line.
pub fn encode_event(event: &SyncEvent) -> Result<Bytes> {
    let mut line = serde_json::to_vec(event).map_err(|e| SyncError::Wire(e.to_string()))?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Longest unterminated line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental line decoder.
///
/// Bytes already searched for a newline are not searched again. A pending
/// line longer than the limit yields one `Err` and is skipped up to its
/// newline.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    scanned: usize,
    max_line: usize,
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            discarding: false,
        }
    }

    /// Feed a chunk and return every event completed by it, in order.
    ///
    /// A malformed line yields an `Err` in its position; decoding continues
    /// with the next line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<SyncEvent>> {
        let mut events = Vec::new();

        let chunk = if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(newline) => {
                    self.discarding = false;
                    &chunk[newline + 1..]
                }
                None => return events,
            }
        } else {
            chunk
        };
        self.buffer.extend_from_slice(chunk);

        let mut line_start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let newline = self.scanned + offset;
            if let Some(event) = decode_line(&self.buffer[line_start..newline]) {
                events.push(event);
            }
            line_start = newline + 1;
            self.scanned = line_start;
        }
        self.buffer.drain(..line_start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line {
            events.push(Err(SyncError::Wire(format!(
                "line exceeds {} bytes",
                self.max_line
            ))));
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        events
    }

    /// Decode whatever remains after the final chunk, for a stream whose last
    /// line was not newline-terminated.
    pub fn finish(&mut self) -> Option<Result<SyncEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        decode_line(&rest)
    }

    /// Bytes buffered but not yet terminated by a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(line: &[u8]) -> Option<Result<SyncEvent>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(serde_json::from_slice(line).map_err(|e| {
        SyncError::Wire(format!(
            "{}: {}",
            e,
            String::from_utf8_lossy(&line[..line.len().min(120)])
        ))
    }))
}
