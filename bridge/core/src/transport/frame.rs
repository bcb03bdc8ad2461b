//! Frame Protocol
//!
//! Wire format between the bridge and a socket-hosted Brain: length-prefixed
//! JSON with a CRC32 checksum.
//!
//! # Frame Format
//!
//! ```text
//! +----------------+----------------+------------------------------------------+
//! | Length (4)     | Checksum (4)   | JSON Payload (variable)                  |
//! | big-endian u32 | CRC32          | WireFrame                                |
//! +----------------+----------------+------------------------------------------+
//! ```
//!
//! Length covers the payload only. Frames larger than [`MAX_FRAME_SIZE`] are
//! refused before any buffer is allocated for them.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::TransportError;

/// Maximum frame payload (10 MB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Frame header size: 4 bytes length + 4 bytes checksum
const HEADER_SIZE: usize = 8;

/// Messages exchanged over a Brain socket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireFrame {
    /// Bridge -> backend: run `operation`
    Invoke {
        /// Request id echoed in the reply
        id: u64,
        /// Operation name
        operation: String,
        /// Call arguments
        args: Value,
    },
    /// Backend -> bridge: the call settled
    Reply {
        /// Request id
        id: u64,
        /// Operation result
        result: Value,
    },
    /// Backend -> bridge: the call was rejected
    Failure {
        /// Request id
        id: u64,
        /// Rejection text
        message: String,
    },
    /// Backend -> bridge: pushed event
    Event {
        /// Event stream name
        name: String,
        /// Event payload, unvalidated
        payload: Value,
    },
}

#[inline]
fn compute_checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Encode a message to a length-prefixed frame with CRC32 checksum
///
/// # Errors
///
/// `TransportError::Serialization` if JSON serialization fails or the payload
/// exceeds `MAX_FRAME_SIZE`.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, TransportError> {
    let json = serde_json::to_vec(msg).map_err(|e| TransportError::Serialization(e.to_string()))?;

    if json.len() > MAX_FRAME_SIZE {
        return Err(TransportError::Serialization(format!(
            "Frame too large: {} bytes (max: {MAX_FRAME_SIZE})",
            json.len()
        )));
    }

    let len = u32::try_from(json.len())
        .map_err(|_| TransportError::Serialization("Frame length overflow".to_string()))?;
    let checksum = compute_checksum(&json);

    let mut buf = Vec::with_capacity(HEADER_SIZE + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&checksum.to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Streaming frame parser
///
/// Buffers incoming bytes and yields complete messages.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    read_pos: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to decode the next frame
    ///
    /// `Ok(None)` means more data is needed.
    ///
    /// # Errors
    ///
    /// `ChecksumMismatch` on corruption, `Serialization` on an oversized frame
    /// or a payload that is not the expected JSON.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        let available = self.available();
        if available < HEADER_SIZE {
            return Ok(None);
        }

        let header = &self.buffer[self.read_pos..self.read_pos + HEADER_SIZE];
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

        if len > MAX_FRAME_SIZE {
            return Err(TransportError::Serialization(format!(
                "Frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }
        if available < HEADER_SIZE + len {
            return Ok(None);
        }

        let payload_start = self.read_pos + HEADER_SIZE;
        let payload_end = payload_start + len;
        let payload = &self.buffer[payload_start..payload_end];

        let actual = compute_checksum(payload);
        if actual != expected {
            return Err(TransportError::ChecksumMismatch { expected, actual });
        }

        let msg = serde_json::from_slice(payload)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        self.read_pos = payload_end;

        Ok(Some(msg))
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}
