//! Session pairing code.
//!
//! A host generates one [`PairingCode`] every time its session starts.  The
//! code is shown to the user on the host and also sent to every control peer
//! in the `PIN:dddd` challenge; the peer proves it is allowed to drive the
//! host by echoing the four digits back.
//!
//! # Strength
//!
//! The code is a convenience gate, not an authentication boundary: it has
//! 10 000 possible values and is derived from the wall clock.  Anyone who can
//! open a control connection also receives the code in the challenge.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of ASCII digits in a pairing code.
pub const PAIRING_CODE_LEN: usize = 4;

/// Errors produced when parsing a pairing code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingCodeError {
    /// The input did not contain exactly [`PAIRING_CODE_LEN`] bytes.
    #[error("pairing code must be exactly 4 digits, got {0} bytes")]
    WrongLength(usize),
    /// The input contained a byte outside `'0'..='9'`.
    #[error("pairing code must contain only ASCII digits")]
    NonDigit,
}

/// A 4-digit session pairing code stored as its ASCII bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairingCode([u8; PAIRING_CODE_LEN]);

impl PairingCode {
    /// Generates a new code from the current time and thread identity.
    pub fn generate() -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        use std::time::SystemTime;

        let mut hasher = DefaultHasher::new();
        SystemTime::now().hash(&mut hasher);
        std::thread::current().id().hash(&mut hasher);
        let n = (hasher.finish() % 10_000) as u16;
        Self::from_number(n)
    }

    /// Builds the code whose digits spell `n` zero-padded to four places.
    ///
    /// Values above 9999 keep only their last four digits.
    pub fn from_number(n: u16) -> Self {
        let n = n % 10_000;
        let mut digits = [b'0'; PAIRING_CODE_LEN];
        let mut rest = n;
        for slot in digits.iter_mut().rev() {
            *slot = b'0' + (rest % 10) as u8;
            rest /= 10;
        }
        Self(digits)
    }

    /// Parses a code from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PairingCodeError`] unless `bytes` is exactly four ASCII digits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PairingCodeError> {
        let digits: [u8; PAIRING_CODE_LEN] = bytes
            .try_into()
            .map_err(|_| PairingCodeError::WrongLength(bytes.len()))?;
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(PairingCodeError::NonDigit);
        }
        Ok(Self(digits))
    }

    /// The four ASCII digit bytes exactly as they travel on the wire.
    pub fn as_bytes(&self) -> &[u8; PAIRING_CODE_LEN] {
        &self.0
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII digits are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("0000")
    }

    /// Byte-exact comparison against a peer's reply.
    pub fn matches(&self, reply: &[u8]) -> bool {
        reply == self.0
    }
}

impl FromStr for PairingCode {
    type Err = PairingCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairingCode({})", self.as_str())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
