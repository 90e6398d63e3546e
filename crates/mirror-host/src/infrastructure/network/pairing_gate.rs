//! One-shot PIN challenge run at the start of every control connection.
//!
//! ```text
//! Host                                Controller
//! ────                                ──────────
//! "PIN:0427"  ───────────────────────▶
//!             ◀─────────────────────── "0427"   (exactly 4 bytes)
//! byte-exact compare
//!   match    → streaming may begin
//!   anything else → connection closed, nothing sent back
//! ```
//!
//! There is exactly one attempt per TCP connection.  A short read, a read
//! error, or a mismatch all count as a definitive failure; the caller closes
//! the connection and goes back to accepting.

use std::io::{Read, Write};

use mirror_core::protocol::{encode_pairing_challenge, messages::PAIRING_REPLY_LEN};
use mirror_core::PairingCode;
use thiserror::Error;

use super::framed_io::read_full;

/// Why a pairing attempt failed.
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("failed to send pairing challenge: {0}")]
    Send(#[source] std::io::Error),
    #[error("failed to read pairing reply: {0}")]
    Recv(#[source] std::io::Error),
    #[error("pairing reply was {received} bytes, expected 4")]
    ShortReply { received: usize },
    #[error("pairing reply did not match the session code")]
    Mismatch,
}

/// Sends the challenge for `code` and checks the peer's 4-byte reply.
///
/// # Errors
///
/// Returns [`PairingError`] for every outcome other than an exact match.
pub fn run_pairing_gate<S: Read + Write>(
    stream: &mut S,
    code: &PairingCode,
) -> Result<(), PairingError> {
    stream
        .write_all(&encode_pairing_challenge(code))
        .and_then(|()| stream.flush())
        .map_err(PairingError::Send)?;

    let mut reply = [0u8; PAIRING_REPLY_LEN];
    let received = read_full(stream, &mut reply).map_err(PairingError::Recv)?;
    if received != PAIRING_REPLY_LEN {
        return Err(PairingError::ShortReply { received });
    }
    if !code.matches(&reply) {
        return Err(PairingError::Mismatch);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// An in-memory peer: reads come from `input`, writes land in `output`.
    struct ScriptedPeer {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl ScriptedPeer {
        fn replying(reply: &[u8]) -> Self {
            Self {
                input: Cursor::new(reply.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPeer {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedPeer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// A peer whose writes always fail.
    struct BrokenPipe;

    impl Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn code() -> PairingCode {
        "0427".parse().unwrap()
    }

    #[test]
    fn test_gate_sends_challenge_with_code() {
        // Arrange
        let mut peer = ScriptedPeer::replying(b"0427");

        // Act
        run_pairing_gate(&mut peer, &code()).unwrap();

        // Assert
        assert_eq!(peer.output, b"PIN:0427");
    }

    #[test]
    fn test_gate_accepts_exact_reply() {
        let mut peer = ScriptedPeer::replying(&[b'0', b'4', b'2', b'7']);
        assert!(run_pairing_gate(&mut peer, &code()).is_ok());
    }

    #[test]
    fn test_gate_rejects_wrong_digits() {
        let mut peer = ScriptedPeer::replying(&[b'0', b'4', b'2', b'8']);
        let result = run_pairing_gate(&mut peer, &code());
        assert!(matches!(result, Err(PairingError::Mismatch)));
    }

    #[test]
    fn test_gate_rejects_short_reply() {
        let mut peer = ScriptedPeer::replying(b"042");
        let result = run_pairing_gate(&mut peer, &code());
        assert!(matches!(result, Err(PairingError::ShortReply { received: 3 })));
    }

    #[test]
    fn test_gate_rejects_immediate_close() {
        let mut peer = ScriptedPeer::replying(b"");
        let result = run_pairing_gate(&mut peer, &code());
        assert!(matches!(result, Err(PairingError::ShortReply { received: 0 })));
    }

    #[test]
    fn test_gate_reads_only_four_bytes() {
        // Arrange: the reply is followed by an event record that must stay unread.
        let mut bytes = b"0427".to_vec();
        bytes.extend_from_slice(&[0x01; 17]);
        let mut peer = ScriptedPeer::replying(&bytes);

        // Act
        run_pairing_gate(&mut peer, &code()).unwrap();

        // Assert
        assert_eq!(peer.input.position(), 4);
    }

    #[test]
    fn test_gate_reports_send_failure() {
        let result = run_pairing_gate(&mut BrokenPipe, &code());
        assert!(matches!(result, Err(PairingError::Send(_))));
    }
}
