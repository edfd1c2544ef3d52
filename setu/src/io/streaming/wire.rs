//! Wire format serialization
//!
//! # Framing
//!
//! All TCP traffic (sensor input, publish stream, service endpoint) uses the
//! same length-prefixed framing:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ JSON or Postcard binary  │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! - **Maximum frame size**: `network.max_frame_bytes` (8 MiB default, so raw
//!   HD stereo images fit in Postcard; JSON spends ~3.6 bytes per pixel byte)
//! - **Stalled frame**: read timeouts mid-frame are retried, the frame is
//!   never split
//! - **Oversized frame**: connection closed
//! - **Deserialization failure**: frame logged and discarded, connection
//!   stays open
//!
//! # Wire Formats
//!
//! - **Postcard** (default): compact binary for image streams
//! - **JSON**: human-readable, easy to debug from any language

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default cap on a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Binary format using postcard - fast and compact
    #[default]
    Postcard,
    /// JSON format - human-readable for debugging
    Json,
}

/// Serializer for the configured wire format
#[derive(Debug, Clone)]
pub struct Serializer {
    format: WireFormat,
    max_frame_bytes: usize,
}

impl Serializer {
    /// Create a new serializer for the given format
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Serialize a value to payload bytes
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let bytes = match self.format {
            WireFormat::Postcard => postcard::to_allocvec(value)?,
            WireFormat::Json => serde_json::to_vec(value)?,
        };
        Ok(bytes)
    }

    /// Deserialize payload bytes
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let value = match self.format {
            WireFormat::Postcard => postcard::from_bytes(bytes)?,
            WireFormat::Json => serde_json::from_slice(bytes)?,
        };
        Ok(value)
    }

    /// Serialize `value` into `buffer` as one length-prefixed frame.
    ///
    /// The buffer is cleared first so callers can reuse it.
    pub fn encode_frame<T: Serialize>(&self, value: &T, buffer: &mut Vec<u8>) -> Result<()> {
        let payload = self.serialize(value)?;
        if payload.len() > self.max_frame_bytes {
            return Err(Error::MessageTooLarge {
                size: payload.len(),
                max: self.max_frame_bytes,
            });
        }

        buffer.clear();
        buffer.reserve(4 + payload.len());
        buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&payload);
        Ok(())
    }

    /// Write one frame to a stream.
    pub fn write_frame<T: Serialize, W: Write>(&self, writer: &mut W, value: &T) -> Result<()> {
        let mut buffer = Vec::new();
        self.encode_frame(value, &mut buffer)?;
        writer.write_all(&buffer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one frame payload into `buffer`.
    ///
    /// Returns `Ok(false)` when the read timed out before any byte of the
    /// length prefix arrived, so polling loops can check their shutdown
    /// flag. Once a frame has started, read timeouts are retried until the
    /// frame is complete; only a cleared `running` flag abandons it, also
    /// with `Ok(false)`.
    pub fn read_frame_into<R: Read>(
        &self,
        reader: &mut R,
        buffer: &mut Vec<u8>,
        running: &AtomicBool,
    ) -> Result<bool> {
        let mut len_buf = [0u8; 4];
        if !read_patiently(reader, &mut len_buf, running, true)? {
            return Ok(false);
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > self.max_frame_bytes {
            return Err(Error::MessageTooLarge {
                size: len,
                max: self.max_frame_bytes,
            });
        }

        buffer.clear();
        buffer.resize(len, 0);
        read_patiently(reader, buffer, running, false)
    }

    /// Read and decode one frame, blocking until it arrives.
    pub fn read_frame<T: DeserializeOwned, R: Read>(&self, reader: &mut R) -> Result<T> {
        let forever = AtomicBool::new(true);
        let mut buffer = Vec::new();
        loop {
            if self.read_frame_into(reader, &mut buffer, &forever)? {
                return self.deserialize(&buffer);
            }
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Fill `buf` completely, riding out read timeouts.
///
/// Returns `Ok(false)` without consuming anything when `idle_ok` is set and
/// the first read times out, or when `running` clears while waiting.
fn read_patiently<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    running: &AtomicBool,
    idle_ok: bool,
) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::Io(io::ErrorKind::UnexpectedEof.into())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if is_timeout(&e) => {
                if (idle_ok && filled == 0) || !running.load(Ordering::Relaxed) {
                    return Ok(false);
                }
                log::trace!("Frame stalled after {} of {} bytes", filled, buf.len());
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}
