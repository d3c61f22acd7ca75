//! Stream decoder: raw bytes to caption events
//!
//! Converts an open byte stream into an ordered sequence of [`StreamEvent`]s,
//! handling chunk boundaries that split lines and/or multi-byte characters
//! arbitrarily. Decoding is stateful across chunks: an incomplete UTF-8
//! sequence at a chunk boundary is held back until the rest arrives, and the
//! text after the last line feed is buffered, never parsed prematurely.

use std::borrow::Cow;

use crate::error::LineError;
use crate::types::StreamEvent;

/// Outcome of decoding one complete line
#[derive(Debug)]
pub enum LineOutcome {
    /// The line parsed as a stream event
    Event(StreamEvent),
    /// The line was skipped; decoding continues with the next line
    Warning(ParseWarning),
}

/// A recoverable per-line decode failure
#[derive(Debug)]
pub struct ParseWarning {
    /// The offending line, as decoded
    pub line: String,
    pub error: LineError,
}

/// Incremental decoder for a newline-delimited JSON event stream
///
/// Chunks may be of arbitrary, unpredictable size. Feeding a stream one byte
/// at a time yields the same event sequence as feeding it whole.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Trailing bytes of a UTF-8 sequence cut off at a chunk boundary
    carry: Vec<u8>,
    /// Decoded text after the last line feed
    line_buf: String,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the outcome of every line it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LineOutcome> {
        self.decode_text(chunk);
        self.drain_lines()
    }

    /// Signal end of stream.
    ///
    /// A well-formed producer terminates every line with a line feed, so the
    /// buffer is normally empty here. A non-blank leftover gets a best-effort
    /// parse rather than being dropped, surfacing either a final event or a
    /// final recoverable warning.
    pub fn finish(&mut self) -> Option<LineOutcome> {
        if !self.carry.is_empty() {
            // An incomplete character at end of stream decodes to the
            // replacement character, like a flushed text decoder.
            self.carry.clear();
            self.line_buf.push(char::REPLACEMENT_CHARACTER);
        }
        let leftover = std::mem::take(&mut self.line_buf);
        let line = leftover.trim();
        if line.is_empty() {
            return None;
        }
        tracing::debug!("parsing {}-byte leftover buffer at end of stream", line.len());
        Some(classify(line))
    }

    /// Bytes currently held back as an incomplete character or line
    pub fn pending(&self) -> usize {
        self.carry.len() + self.line_buf.len()
    }

    /// Decode a chunk into the line buffer, carrying any incomplete trailing
    /// UTF-8 sequence over to the next chunk. Invalid sequences are replaced
    /// with U+FFFD and decoding continues.
    fn decode_text(&mut self, chunk: &[u8]) {
        let data: Cow<[u8]> = if self.carry.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            self.carry.extend_from_slice(chunk);
            Cow::Owned(std::mem::take(&mut self.carry))
        };

        let mut rest: &[u8] = &data;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.line_buf.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    // SAFETY: `valid` is exactly the prefix from_utf8 validated.
                    self.line_buf
                        .push_str(unsafe { std::str::from_utf8_unchecked(valid) });
                    match err.error_len() {
                        Some(len) => {
                            self.line_buf.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // A multi-byte character cut off at the chunk
                            // boundary; hold the bytes until the rest arrives.
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Split the line buffer on line feeds. All pieces but the last are
    /// complete lines; the last (possibly empty) becomes the new buffer.
    fn drain_lines(&mut self) -> Vec<LineOutcome> {
        if !self.line_buf.contains('\n') {
            return Vec::new();
        }
        let buf = std::mem::take(&mut self.line_buf);
        let mut pieces: Vec<&str> = buf.split('\n').collect();
        let tail = pieces.pop().unwrap_or("");

        let mut outcomes = Vec::new();
        for line in pieces {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            outcomes.push(classify(line));
        }
        self.line_buf = tail.to_string();
        outcomes
    }
}

fn classify(line: &str) -> LineOutcome {
    match StreamEvent::classify(line) {
        Ok(event) => LineOutcome::Event(event),
        Err(error) => LineOutcome::Warning(ParseWarning {
            line: line.to_string(),
            error,
        }),
    }
}
