//! Network infrastructure for the host application.
//!
//! # Sub-modules
//!
//! - **`discovery`** – Answers UDP discovery probes with the fixed response
//!   token.  Runs on its own thread for the session's lifetime.
//!
//! - **`connection_slot`** – The guarded "at most one live connection" handle
//!   shared by an accept loop, its connection worker, outside producers, and
//!   the shutdown path.
//!
//! - **`pairing_gate`** – The one-shot `PIN:dddd` challenge every control
//!   connection must pass before any event is dispatched.
//!
//! - **`control_channel`** – Accept loop and per-connection worker for the
//!   control port: supersession, pairing, then 17-byte record streaming.
//!
//! - **`video_channel`** – Accept loop, descriptor handshake, frame pushing,
//!   and the 100 ms liveness poll for the video port.
//!
//! - **`framed_io`** – Blocking read helpers shared by the channels.
//!
//! # Cancellation
//!
//! Every loop here blocks in real socket calls.  The session unblocks them on
//! shutdown by clearing the shared `running` flag first and then disturbing
//! the socket: peer connections are shut down, listeners receive a throwaway
//! loopback connection, and the discovery socket receives a throwaway
//! datagram.  A loop that wakes with an error checks `running` to tell a
//! shutdown from a fault.

pub mod connection_slot;
pub mod control_channel;
pub mod discovery;
pub mod framed_io;
pub mod pairing_gate;
pub mod video_channel;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Which TCP channel a socket belongs to; used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Video,
    Control,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Video => f.write_str("video"),
            ChannelKind::Control => f.write_str("control"),
        }
    }
}

/// Maps a wildcard bind address to the loopback address of the same family,
/// so the host can reach its own sockets when waking them.
pub(crate) fn local_wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}
