//! Control channel client.
//!
//! The host speaks first: every control connection starts with an 8-byte
//! `PIN:dddd` challenge.  The controller answers with the four digits the
//! user typed.  The host never confirms success; it simply closes the
//! connection on a wrong code.  [`PendingPairing::pair`] therefore waits a
//! short grace period after replying and treats a close within that window
//! as a rejection.
//!
//! ```text
//! PendingPairing::connect ──▶ advertised_code()
//!                         └─▶ pair(code) ──▶ ControlSender ──▶ send_*()
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use mirror_core::protocol::{
    decode_pairing_challenge, encode_control_event, ControlEvent, PAIRING_CHALLENGE_LEN,
};
use mirror_core::PairingCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

use crate::error::ControllerError;

/// How long a close after our reply still counts as a rejection.
pub const PAIRING_GRACE: Duration = Duration::from_millis(100);

/// A control connection that has received its challenge but not replied.
pub struct PendingPairing {
    stream: TcpStream,
    peer: SocketAddr,
    advertised: PairingCode,
}

impl PendingPairing {
    /// Connects to the control port and reads the challenge.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ConnectFailed`] if the host is unreachable,
    /// [`ControllerError::Closed`] if it hangs up first, and a framing error
    /// if the challenge is malformed.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ControllerError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ControllerError::ConnectFailed { addr, source })?;

        let mut challenge = [0u8; PAIRING_CHALLENGE_LEN];
        stream.read_exact(&mut challenge).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ControllerError::Closed,
            _ => ControllerError::Io(e),
        })?;
        let advertised = decode_pairing_challenge(&challenge)?;
        info!("host at {addr} requests a pairing code");

        Ok(Self {
            stream,
            peer: addr,
            advertised,
        })
    }

    /// The code carried in the host's challenge.
    pub fn advertised_code(&self) -> PairingCode {
        self.advertised
    }

    /// Sends `code` and waits out [`PAIRING_GRACE`].
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::PairingRejected`] if the host closes the
    /// connection within the grace period.
    pub async fn pair(self, code: &PairingCode) -> Result<ControlSender, ControllerError> {
        self.pair_within(code, PAIRING_GRACE).await
    }

    /// [`pair`](Self::pair) with an explicit grace period, for slow links.
    pub async fn pair_within(
        mut self,
        code: &PairingCode,
        grace: Duration,
    ) -> Result<ControlSender, ControllerError> {
        self.stream.write_all(code.as_bytes()).await?;

        let mut probe = [0u8; 1];
        match time::timeout(grace, self.stream.peek(&mut probe)).await {
            Err(_) => {}
            Ok(Ok(0)) => return Err(ControllerError::PairingRejected),
            Ok(Ok(_)) => debug!("host sent unexpected bytes after pairing"),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                return Err(ControllerError::PairingRejected)
            }
            Ok(Err(e)) => return Err(e.into()),
        }

        info!("paired with host at {}", self.peer);
        Ok(ControlSender {
            stream: self.stream,
            peer: self.peer,
            events_sent: 0,
        })
    }
}

/// A paired control connection.
pub struct ControlSender {
    stream: TcpStream,
    peer: SocketAddr,
    events_sent: u64,
}

impl ControlSender {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    /// Sends one 17-byte record.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Io`] if the write fails; the host has
    /// usually closed the connection.
    pub async fn send_event(&mut self, event: &ControlEvent) -> Result<(), ControllerError> {
        self.stream.write_all(&encode_control_event(event)).await?;
        self.events_sent += 1;
        Ok(())
    }

    pub async fn send_mouse(
        &mut self,
        x: i32,
        y: i32,
        button: i32,
        action: i32,
    ) -> Result<(), ControllerError> {
        self.send_event(&ControlEvent::mouse(x, y, button, action)).await
    }

    pub async fn send_key(&mut self, keycode: i32, action: i32) -> Result<(), ControllerError> {
        self.send_event(&ControlEvent::key(keycode, action)).await
    }

    /// Sends a ping stamped with the low 32 bits of the wall clock in
    /// milliseconds.
    ///
    /// Returns the time spent handing the record to the socket.  The host
    /// does not echo pings, so this is not a round-trip time.
    pub async fn send_ping(&mut self) -> Result<Duration, ControllerError> {
        let started = Instant::now();
        self.send_event(&ControlEvent::ping(wall_clock_ms())).await?;
        Ok(started.elapsed())
    }

    /// Closes the write side so the host sees a graceful end of stream.
    pub async fn shutdown(mut self) -> Result<(), ControllerError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn wall_clock_ms() -> i32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    millis as u32 as i32
}

// ── Tests ─────────────────────────────────────────────────────────────────────
