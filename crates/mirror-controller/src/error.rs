//! Error type shared by the controller's connections.

use std::net::SocketAddr;
use std::time::Duration;

use mirror_core::protocol::FramingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// TCP connection to the host failed.
    #[error("failed to connect to host at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on an established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host sent bytes that do not follow the wire format.
    #[error("protocol error: {0}")]
    Framing(#[from] FramingError),

    /// No host answered before the deadline.
    #[error("no host answered discovery within {0:?}")]
    DiscoveryTimeout(Duration),

    /// The host closed the control connection after our pairing reply.
    #[error("host rejected the pairing code")]
    PairingRejected,

    /// A frame header announced more bytes than the receiver accepts.
    #[error("frame of {len} bytes exceeds the {limit}-byte limit")]
    FrameTooLarge { len: usize, limit: usize },

    /// The descriptor line was not newline-terminated within the size limit.
    #[error("video descriptor line longer than {0} bytes")]
    DescriptorTooLong(usize),

    /// The host closed the connection in the middle of a message.
    #[error("connection closed by host")]
    Closed,
}
