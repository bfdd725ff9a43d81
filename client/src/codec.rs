//! JSON-RPC framing for mutation server communication.
//!
//! The wire format is `Content-Length: N\r\n\r\n{json}`, repeated
//! back-to-back with no delimiter beyond the declared length. Incoming data
//! arrives as arbitrary chunks from a pipe or socket, so [`FrameDecoder`]
//! is push-based: it buffers across calls and emits whatever complete
//! frames each chunk completes. Bytes preceding a recognizable header are
//! discarded silently, and a malformed payload between valid headers is
//! logged and skipped rather than stalling the stream.

const HEADER_TOKEN: &[u8] = b"content-length:";
const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Encode one JSON-RPC message with the `Content-Length` framing the
/// decoder expects, so both directions share exactly one framing definition.
#[must_use]
pub fn encode_frame(frame: &serde_json::Value) -> Vec<u8> {
    let body = serde_json::to_vec(frame).expect("serializing a serde_json::Value is infallible");
    let mut bytes = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    bytes.extend_from_slice(&body);
    bytes
}

/// Incremental decoder for `Content-Length`-framed JSON-RPC messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    decode_errors: u64,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames that failed to decode (bad length value, oversized
    /// declaration, or unparseable JSON body) since construction.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Consume a chunk and return every frame it completes, in arrival
    /// order. Incomplete trailing data is buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<serde_json::Value> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            let Some(header_at) = find_header_token(&self.buf) else {
                // Junk only. Keep a tail one byte shorter than the token so
                // a header split across chunks can still complete.
                if self.buf.len() >= HEADER_TOKEN.len() {
                    let junk = self.buf.len() - (HEADER_TOKEN.len() - 1);
                    self.buf.drain(..junk);
                }
                break;
            };
            if header_at > 0 {
                self.buf.drain(..header_at);
            }

            // End of the header section; until it arrives there is nothing
            // to do but wait for more input.
            let Some(separator_at) = find(&self.buf, HEADER_SEPARATOR) else {
                break;
            };

            let Some(content_length) = self.parse_content_length() else {
                // Skip past the bad header token and rescan.
                self.buf.drain(..HEADER_TOKEN.len());
                continue;
            };

            let payload_start = separator_at + HEADER_SEPARATOR.len();
            let payload_end = payload_start + content_length;
            if self.buf.len() < payload_end {
                break;
            }

            match serde_json::from_slice(&self.buf[payload_start..payload_end]) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    self.decode_errors += 1;
                    tracing::warn!("skipping malformed JSON-RPC payload: {e}");
                }
            }
            self.buf.drain(..payload_end);
        }

        frames
    }

    /// Parse the length value on the `Content-Length` line at the start of
    /// the buffer. `None` counts as a decode error.
    fn parse_content_length(&mut self) -> Option<usize> {
        let line_end = find(&self.buf, b"\r\n").unwrap_or(self.buf.len());
        let value = &self.buf[HEADER_TOKEN.len()..line_end];
        let parsed = std::str::from_utf8(value)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());
        match parsed {
            Some(n) if n <= MAX_FRAME_BYTES => Some(n),
            Some(n) => {
                self.decode_errors += 1;
                tracing::warn!("declared frame length {n} exceeds maximum {MAX_FRAME_BYTES}");
                None
            }
            None => {
                self.decode_errors += 1;
                tracing::warn!("invalid Content-Length value in frame header");
                None
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn find_header_token(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(HEADER_TOKEN.len())
        .position(|window| window.eq_ignore_ascii_case(HEADER_TOKEN))
}
