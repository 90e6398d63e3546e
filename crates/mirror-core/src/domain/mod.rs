//! Domain entities for mirror-remote.
//!
//! Pure values with no infrastructure dependencies.  The only stateful-looking
//! concept, the session pairing code, is modelled here as an immutable value;
//! the session that owns it lives in `mirror-host`.

/// The 4-digit code a controller must echo back to be allowed to send input.
pub mod pairing_code;
