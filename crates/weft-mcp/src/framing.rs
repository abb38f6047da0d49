//! Length-prefixed framing for socket transports.
//!
//! Every frame is an 8-byte little-endian `u64` length followed by that
//! many payload bytes. Response payloads start with a status byte:
//! [`STATUS_OK`] followed by the message bytes verbatim, or
//! [`STATUS_ERROR`] followed by a UTF-8 description.

use std::io::{self, Read, Write};

use crate::error::McpError;

/// Status byte of a successful response.
pub const STATUS_OK: u8 = 0;
/// Status byte of an error response.
pub const STATUS_ERROR: u8 = 1;
/// Largest payload accepted from the wire (1 GiB).
pub const MAX_FRAME_LEN: u64 = 1 << 30;

const HEADER_LEN: usize = 8;

// ── Writing ─────────────────────────────────────────────────────

/// Write one frame and flush.
pub fn write_frame(w: &mut dyn Write, payload: &[u8]) -> Result<(), McpError> {
    w.write_all(&(payload.len() as u64).to_le_bytes())?;
    w.write_all(payload)?;
    w.flush()?;
    Ok(())
}

/// Encode a response payload.
pub fn encode_response(result: Result<&[u8], &str>) -> Vec<u8> {
    let (status, body) = match result {
        Ok(message) => (STATUS_OK, message),
        Err(description) => (STATUS_ERROR, description.as_bytes()),
    };
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(status);
    out.extend_from_slice(body);
    out
}

/// Decode a response payload into the message or the server's error.
pub fn decode_response(mut payload: Vec<u8>) -> Result<Vec<u8>, McpError> {
    match payload.first() {
        Some(&STATUS_OK) => {
            payload.remove(0);
            Ok(payload)
        }
        Some(&STATUS_ERROR) => Err(McpError::Remote {
            message: String::from_utf8_lossy(&payload[1..]).into_owned(),
        }),
        Some(other) => Err(McpError::Protocol {
            reason: format!("unknown response status {other}"),
        }),
        None => Err(McpError::Protocol {
            reason: "empty response".to_string(),
        }),
    }
}

// ── Reading ─────────────────────────────────────────────────────

/// Incremental frame reader that survives read timeouts.
///
/// Sockets read with a timeout may stop in the middle of a frame. The
/// reader keeps whatever has arrived so far, so the caller can act on the
/// timeout and then call [`poll`](FrameReader::poll) again.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
    payload_len: Option<usize>,
}

impl FrameReader {
    /// A reader with no partial frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether part of a frame has been consumed.
    pub fn in_progress(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Read until a frame is complete or the read times out.
    ///
    /// Returns `Ok(None)` on timeout (`WouldBlock` or `TimedOut`). End of
    /// stream before a frame starts is [`McpError::Closed`]; inside a frame
    /// it is a protocol error.
    pub fn poll(&mut self, r: &mut dyn Read) -> Result<Option<Vec<u8>>, McpError> {
        loop {
            let target = match self.payload_len {
                None => HEADER_LEN,
                Some(len) => HEADER_LEN + len,
            };
            if self.buf.len() == target {
                if let Some(len) = self.payload_len {
                    let mut frame = std::mem::take(&mut self.buf);
                    frame.drain(..HEADER_LEN);
                    debug_assert_eq!(frame.len(), len);
                    self.payload_len = None;
                    return Ok(Some(frame));
                }
                let mut header = [0u8; HEADER_LEN];
                header.copy_from_slice(&self.buf);
                let len = u64::from_le_bytes(header);
                if len > MAX_FRAME_LEN {
                    return Err(McpError::FrameTooLarge {
                        len,
                        max: MAX_FRAME_LEN,
                    });
                }
                self.payload_len = Some(len as usize);
                self.buf.reserve(len as usize);
                continue;
            }

            let start = self.buf.len();
            self.buf.resize(target, 0);
            match r.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    return Err(if start == 0 {
                        McpError::Closed
                    } else {
                        McpError::Protocol {
                            reason: "connection closed mid-frame".to_string(),
                        }
                    });
                }
                Ok(n) => self.buf.truncate(start + n),
                Err(e) => {
                    self.buf.truncate(start);
                    match e.kind() {
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => return Ok(None),
                        io::ErrorKind::Interrupted => {}
                        _ => return Err(e.into()),
                    }
                }
            }
        }
    }
}

/// Read one complete frame from a blocking reader.
pub fn read_frame(r: &mut dyn Read) -> Result<Vec<u8>, McpError> {
    let mut reader = FrameReader::new();
    loop {
        if let Some(frame) = reader.poll(r)? {
            return Ok(frame);
        }
    }
}
