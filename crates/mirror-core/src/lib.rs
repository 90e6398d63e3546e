//! # mirror-core
//!
//! Shared library for mirror-remote containing the wire framing routines and
//! the small set of domain types both ends of a session agree on.
//!
//! This crate is used by both the host and the controller applications.
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.
//!
//! # Architecture overview
//!
//! mirror-remote lets a *controller* device find a *host* device on the local
//! network, pair with it using a short PIN, watch the host's screen as a live
//! video feed, and send input events back.  Four wire messages make that
//! possible, and this crate defines every one of them:
//!
//! - **Discovery** – a UDP probe token and the fixed response token.
//! - **Pairing** – the `PIN:dddd` challenge and the 4-byte reply.
//! - **Control events** – fixed 17-byte records (tag + four big-endian `i32`).
//! - **Video** – a one-line JSON descriptor followed by length-prefixed frames.
//!
//! Everything here is pure: functions take bytes and return bytes or typed
//! values.  The stateful parts (sockets, threads, supersession) live in
//! `mirror-host` and `mirror-controller`.

pub mod domain;
pub mod protocol;

pub use domain::pairing_code::{PairingCode, PairingCodeError, PAIRING_CODE_LEN};
pub use protocol::codec::FramingError;
pub use protocol::descriptor::VideoDescriptor;
pub use protocol::messages::{ControlEvent, EventKind};
