//! UDP discovery responder.
//!
//! The host binds a UDP socket on the discovery port (default 8002) and
//! answers every datagram whose payload is exactly the request token with the
//! response token, sent back to the datagram's source address.  Anything else
//! is ignored silently.  There is no request id, no retry, and no
//! acknowledgement: a controller that misses the reply simply probes again.
//!
//! # Lifecycle
//!
//! ```text
//! Listening ──request──▶ reply ──▶ Listening
//! Listening ──other────▶ ignore ─▶ Listening
//! Listening ──socket error / shutdown──▶ Stopped
//! ```
//!
//! The responder runs on a dedicated thread for the session's lifetime.  The
//! socket carries a 500 ms read timeout so the loop re-checks the `running`
//! flag even if the shutdown wake datagram is lost.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use mirror_core::protocol::discovery_reply;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::framed_io::is_timeout_error;
use super::local_wake_addr;

/// Receive buffer size; larger probes are truncated and therefore never match.
const RECV_BUFFER_SIZE: usize = 1024;

/// How often a blocked receive re-checks the running flag.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Payload of the datagram that wakes the responder at shutdown.
const WAKE_PAYLOAD: &[u8] = b"STOP";

/// Error type for discovery responder operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The socket could not be configured after binding.
    #[error("failed to configure discovery socket: {0}")]
    Configure(#[source] std::io::Error),
}

/// A bound discovery socket, ready to run.
#[derive(Debug)]
pub struct DiscoveryResponder {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl DiscoveryResponder {
    /// Binds the discovery socket.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::BindFailed`] if the socket cannot be bound.
    pub fn bind(addr: SocketAddr) -> Result<Self, DiscoveryError> {
        let socket =
            UdpSocket::bind(addr).map_err(|source| DiscoveryError::BindFailed { addr, source })?;
        socket
            .set_read_timeout(Some(RECV_POLL_INTERVAL))
            .map_err(DiscoveryError::Configure)?;
        let local_addr = socket.local_addr().map_err(DiscoveryError::Configure)?;
        Ok(Self { socket, local_addr })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the receive loop until `running` is cleared or the socket fails.
    pub fn run(self, running: Arc<AtomicBool>) {
        info!("discovery responder listening on UDP {}", self.local_addr);
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        while running.load(Ordering::SeqCst) {
            let (len, src) = match self.socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(e) if is_timeout_error(&e) => continue,
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        error!("discovery recv error: {e}");
                    }
                    break;
                }
            };

            if !running.load(Ordering::SeqCst) {
                break;
            }

            match discovery_reply(&buf[..len]) {
                Some(response) => {
                    debug!("discovery probe from {src}");
                    if let Err(e) = self.socket.send_to(response, src) {
                        warn!("failed to answer discovery probe from {src}: {e}");
                    }
                }
                None => debug!("ignoring {len}-byte datagram from {src}"),
            }
        }

        info!("discovery responder stopped");
    }
}

/// Sends one throwaway datagram to the responder at `bound` so a pending
/// receive returns.
pub(crate) fn wake_discovery(bound: SocketAddr) {
    let target = local_wake_addr(bound);
    let local: SocketAddr = match target.ip() {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    match UdpSocket::bind(local) {
        Ok(socket) => {
            if let Err(e) = socket.send_to(WAKE_PAYLOAD, target) {
                debug!("discovery wake datagram to {target} failed: {e}");
            }
        }
        Err(e) => debug!("could not bind socket for discovery wake: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
