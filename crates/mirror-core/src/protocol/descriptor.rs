//! The video handshake descriptor.
//!
//! Sent once per accepted video connection, before the first frame, as a
//! single JSON line with a space after each comma:
//!
//! ```text
//! {"width":1280, "height":720, "codec":"H.264"}\n
//! ```
//!
//! # Schema versions
//!
//! | Version | Keys (in wire order)                    |
//! |---------|-----------------------------------------|
//! | 1       | `width` (int), `height` (int), `codec` (string) |
//!
//! Key order follows the field order of [`VideoDescriptor`].  Receivers
//! ignore keys they do not know, so later versions may only append keys.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;

use crate::protocol::codec::FramingError;

/// Upper bound on a descriptor line a receiver will buffer.
pub const MAX_DESCRIPTOR_LINE: usize = 1024;

/// Stream parameters announced to a video peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl Default for VideoDescriptor {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            codec: "H.264".to_string(),
        }
    }
}

impl VideoDescriptor {
    pub fn new(width: u32, height: u32, codec: impl Into<String>) -> Self {
        Self {
            width,
            height,
            codec: codec.into(),
        }
    }

    /// Serializes the descriptor as one newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::MalformedDescriptor`] if serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, FramingError> {
        let mut line = Vec::with_capacity(64);
        let mut ser = serde_json::Serializer::with_formatter(&mut line, LineFormatter);
        self.serialize(&mut ser)
            .map_err(|e| FramingError::MalformedDescriptor(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parses a descriptor line; a trailing `\n` or `\r\n` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::MalformedDescriptor`] for invalid JSON or
    /// missing keys.
    pub fn from_line(line: &[u8]) -> Result<Self, FramingError> {
        let trimmed = line
            .strip_suffix(b"\n")
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .unwrap_or(line);
        serde_json::from_slice(trimmed)
            .map_err(|e| FramingError::MalformedDescriptor(e.to_string()))
    }
}

/// Compact JSON except that object members are separated by `", "`.
struct LineFormatter;

impl Formatter for LineFormatter {
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
