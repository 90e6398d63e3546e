//! Byte-level encode/decode routines for the four wire messages.
//!
//! Wire formats:
//! ```text
//! discovery   request/response tokens, compared byte-for-byte
//! pairing     host → peer  "PIN:" + 4 ASCII digits          (8 bytes)
//!             peer → host  4 ASCII digits                    (4 bytes)
//! control     [type:1][x:4][y:4][keycode:4][action:4]        (17 bytes)
//! video       [len:4][payload:len]                           (4 + len bytes)
//! ```
//! All multi-byte integers are big-endian.

use thiserror::Error;

use crate::domain::pairing_code::{PairingCode, PairingCodeError};
use crate::protocol::messages::{
    ControlEvent, CONTROL_EVENT_SIZE, DISCOVERY_REQUEST, DISCOVERY_RESPONSE, FRAME_HEADER_SIZE,
    PAIRING_CHALLENGE_LEN, PAIRING_PREFIX,
};

/// Errors that can occur while encoding or decoding a wire message.
#[derive(Debug, Error, PartialEq)]
pub enum FramingError {
    /// A fixed-size record arrived with the wrong number of bytes.
    #[error("invalid record length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A frame payload is too large for the 32-bit length prefix, or larger
    /// than a receiver is willing to buffer.
    #[error("frame of {len} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { len: usize, limit: usize },

    /// The pairing challenge did not start with `PIN:`.
    #[error("pairing challenge is missing the PIN: prefix")]
    MissingPairingPrefix,

    /// The digits in a pairing message were invalid.
    #[error("invalid pairing code: {0}")]
    InvalidPairingCode(#[from] PairingCodeError),

    /// The video descriptor line could not be produced or parsed.
    #[error("malformed video descriptor: {0}")]
    MalformedDescriptor(String),
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Returns the response token when `payload` is exactly the request token.
pub fn discovery_reply(payload: &[u8]) -> Option<&'static [u8]> {
    (payload == DISCOVERY_REQUEST).then_some(DISCOVERY_RESPONSE)
}

/// Whether `payload` is exactly the host's response token.
pub fn is_discovery_response(payload: &[u8]) -> bool {
    payload == DISCOVERY_RESPONSE
}

// ── Pairing ───────────────────────────────────────────────────────────────────

/// Builds the `PIN:dddd` challenge for `code`.
pub fn encode_pairing_challenge(code: &PairingCode) -> [u8; PAIRING_CHALLENGE_LEN] {
    let mut buf = [0u8; PAIRING_CHALLENGE_LEN];
    buf[..PAIRING_PREFIX.len()].copy_from_slice(PAIRING_PREFIX);
    buf[PAIRING_PREFIX.len()..].copy_from_slice(code.as_bytes());
    buf
}

/// Extracts the advertised code from a `PIN:dddd` challenge.
///
/// # Errors
///
/// Returns [`FramingError`] if the length, prefix, or digits are wrong.
pub fn decode_pairing_challenge(bytes: &[u8]) -> Result<PairingCode, FramingError> {
    if bytes.len() != PAIRING_CHALLENGE_LEN {
        return Err(FramingError::InvalidLength {
            expected: PAIRING_CHALLENGE_LEN,
            actual: bytes.len(),
        });
    }
    let (prefix, digits) = bytes.split_at(PAIRING_PREFIX.len());
    if prefix != PAIRING_PREFIX {
        return Err(FramingError::MissingPairingPrefix);
    }
    Ok(PairingCode::from_bytes(digits)?)
}

// ── Control events ────────────────────────────────────────────────────────────

/// Encodes one control record.
pub fn encode_control_event(event: &ControlEvent) -> [u8; CONTROL_EVENT_SIZE] {
    let mut buf = [0u8; CONTROL_EVENT_SIZE];
    buf[0] = event.event_type;
    buf[1..5].copy_from_slice(&event.x.to_be_bytes());
    buf[5..9].copy_from_slice(&event.y.to_be_bytes());
    buf[9..13].copy_from_slice(&event.keycode.to_be_bytes());
    buf[13..17].copy_from_slice(&event.action.to_be_bytes());
    buf
}

/// Decodes a control record from a slice of unknown length.
///
/// # Errors
///
/// Returns [`FramingError::InvalidLength`] unless `bytes` is exactly
/// [`CONTROL_EVENT_SIZE`] long.
pub fn decode_control_event(bytes: &[u8]) -> Result<ControlEvent, FramingError> {
    let record: &[u8; CONTROL_EVENT_SIZE] =
        bytes.try_into().map_err(|_| FramingError::InvalidLength {
            expected: CONTROL_EVENT_SIZE,
            actual: bytes.len(),
        })?;
    Ok(decode_control_record(record))
}

/// Decodes one complete control record.
///
/// Unknown tags and any integer values are passed through.
pub fn decode_control_record(record: &[u8; CONTROL_EVENT_SIZE]) -> ControlEvent {
    ControlEvent {
        event_type: record[0],
        x: read_i32(record, 1),
        y: read_i32(record, 5),
        keycode: read_i32(record, 9),
        action: read_i32(record, 13),
    }
}

fn read_i32(record: &[u8; CONTROL_EVENT_SIZE], at: usize) -> i32 {
    i32::from_be_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

// ── Video frames ──────────────────────────────────────────────────────────────

/// Encodes `[big-endian len][payload]` as a single buffer so the frame can be
/// written in one transmission.
///
/// # Errors
///
/// Returns [`FramingError::FrameTooLarge`] if `payload` does not fit a `u32`.
pub fn encode_video_frame(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let len = u32::try_from(payload.len()).map_err(|_| FramingError::FrameTooLarge {
        len: payload.len(),
        limit: u32::MAX as usize,
    })?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Reads the payload length out of a frame header.
pub fn decode_frame_header(header: [u8; FRAME_HEADER_SIZE]) -> usize {
    u32::from_be_bytes(header) as usize
}

// ── Tests ─────────────────────────────────────────────────────────────────────
