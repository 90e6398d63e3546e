//! Wire constants and message types.
//!
//! Every multi-byte integer on the wire is big-endian.

use serde::{Deserialize, Serialize};

// ── Default ports ─────────────────────────────────────────────────────────────

/// Default TCP port of the video channel.
pub const DEFAULT_VIDEO_PORT: u16 = 8000;

/// Default TCP port of the control channel.
pub const DEFAULT_CONTROL_PORT: u16 = 8001;

/// Default UDP port the discovery responder listens on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 8002;

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Payload a controller broadcasts to locate hosts.
pub const DISCOVERY_REQUEST: &[u8] = b"SMARTCONTROLX_DISCOVERY_REQUEST";

/// Payload a host sends back to the prober's address.
pub const DISCOVERY_RESPONSE: &[u8] = b"SMARTCONTROLX_DISCOVERY_RESPONSE";

// ── Pairing ───────────────────────────────────────────────────────────────────

/// Prefix of the host's pairing challenge.
pub const PAIRING_PREFIX: &[u8] = b"PIN:";

/// Total length of the challenge: prefix plus four digits.
pub const PAIRING_CHALLENGE_LEN: usize = PAIRING_PREFIX.len() + crate::PAIRING_CODE_LEN;

/// Length of the controller's reply.
pub const PAIRING_REPLY_LEN: usize = crate::PAIRING_CODE_LEN;

// ── Control events ────────────────────────────────────────────────────────────

/// Size of one control record: `[type:1][x:4][y:4][keycode:4][action:4]`.
pub const CONTROL_EVENT_SIZE: usize = 17;

/// Known event type tags.  Decoding never rejects other values.
pub mod event_types {
    pub const MOUSE: u8 = 0x01;
    pub const KEY: u8 = 0x02;
    pub const PING: u8 = 0x04;
}

/// Known action codes carried in the `action` field.
pub mod actions {
    pub const UP: i32 = 0;
    pub const DOWN: i32 = 1;
    pub const MOVE: i32 = 2;
}

/// Descriptive classification of a [`ControlEvent`] tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Mouse,
    Key,
    Ping,
}

impl EventKind {
    /// Maps a tag to a known kind, or `None` for tags this build does not name.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            event_types::MOUSE => Some(EventKind::Mouse),
            event_types::KEY => Some(EventKind::Key),
            event_types::PING => Some(EventKind::Ping),
            _ => None,
        }
    }
}

/// One decoded control record.
///
/// Field values are passed through uninterpreted; the input sink decides
/// what a tag or action means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub event_type: u8,
    pub x: i32,
    pub y: i32,
    pub keycode: i32,
    pub action: i32,
}

impl ControlEvent {
    /// A mouse event at `(x, y)`; `button` travels in the keycode field.
    pub fn mouse(x: i32, y: i32, button: i32, action: i32) -> Self {
        Self {
            event_type: event_types::MOUSE,
            x,
            y,
            keycode: button,
            action,
        }
    }

    /// A keyboard event.
    pub fn key(keycode: i32, action: i32) -> Self {
        Self {
            event_type: event_types::KEY,
            x: 0,
            y: 0,
            keycode,
            action,
        }
    }

    /// A latency probe; the sender's millisecond timestamp travels in `x`.
    pub fn ping(timestamp_ms: i32) -> Self {
        Self {
            event_type: event_types::PING,
            x: timestamp_ms,
            y: 0,
            keycode: 0,
            action: 0,
        }
    }

    /// The named kind of this event's tag, if any.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_tag(self.event_type)
    }
}

// ── Video ─────────────────────────────────────────────────────────────────────

/// Size of the big-endian length prefix in front of every video frame.
pub const FRAME_HEADER_SIZE: usize = 4;

// ── Tests ─────────────────────────────────────────────────────────────────────
