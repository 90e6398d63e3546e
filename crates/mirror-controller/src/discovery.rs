//! Host discovery over UDP broadcast.
//!
//! The controller sends the request token to the discovery port once per
//! interval until a datagram carrying exactly the response token comes back.
//! The response's source address is the host.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use mirror_core::protocol::{is_discovery_response, DEFAULT_DISCOVERY_PORT, DISCOVERY_REQUEST};
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::error::ControllerError;

/// Where and how long to probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Destination of the probe; the limited broadcast address by default.
    pub target: IpAddr,
    pub port: u16,
    /// Gap between re-sent probes.
    pub interval: Duration,
    /// Overall deadline.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: DEFAULT_DISCOVERY_PORT,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Probes until a host answers and returns the address it answered from.
///
/// # Errors
///
/// Returns [`ControllerError::DiscoveryTimeout`] if nobody answers in time and
/// [`ControllerError::Io`] if the socket fails.
pub async fn discover_host(config: &ProbeConfig) -> Result<SocketAddr, ControllerError> {
    let local: SocketAddr = match config.target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await?;
    socket.set_broadcast(true)?;
    let target = SocketAddr::new(config.target, config.port);
    let deadline = Instant::now() + config.timeout;
    let mut buf = [0u8; 64];

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(ControllerError::DiscoveryTimeout(config.timeout));
        }
        socket.send_to(DISCOVERY_REQUEST, target).await?;
        debug!("sent discovery probe to {target}");

        let window_end = deadline.min(now + config.interval);
        while let Ok(received) = time::timeout_at(window_end, socket.recv_from(&mut buf)).await {
            let (len, from) = received?;
            if is_discovery_response(&buf[..len]) {
                info!("host found at {from}");
                return Ok(from);
            }
            debug!("ignoring {len}-byte datagram from {from}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::protocol::DISCOVERY_RESPONSE;

    fn loopback_probe(port: u16, timeout: Duration) -> ProbeConfig {
        ProbeConfig {
            target: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            interval: Duration::from_millis(50),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_discover_host_returns_responder_address() {
        // Arrange: a fake host that answers the first request.
        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let host_addr = host.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, from) = host.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], DISCOVERY_REQUEST);
            host.send_to(DISCOVERY_RESPONSE, from).await.unwrap();
        });

        // Act
        let found = discover_host(&loopback_probe(host_addr.port(), Duration::from_secs(5)))
            .await
            .unwrap();

        // Assert
        assert_eq!(found, host_addr);
    }

    #[tokio::test]
    async fn test_discover_host_ignores_wrong_token_and_keeps_probing() {
        // Arrange: answers garbage first, the real token on the second probe.
        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let host_addr = host.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, from) = host.recv_from(&mut buf).await.unwrap();
            host.send_to(b"NOPE", from).await.unwrap();
            let (_, from) = host.recv_from(&mut buf).await.unwrap();
            host.send_to(DISCOVERY_RESPONSE, from).await.unwrap();
        });

        // Act
        let found = discover_host(&loopback_probe(host_addr.port(), Duration::from_secs(5))).await;

        // Assert
        assert_eq!(found.unwrap(), host_addr);
    }

    #[tokio::test]
    async fn test_discover_host_times_out_without_answer() {
        // Arrange: a socket that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        // Act
        let result = discover_host(&loopback_probe(port, Duration::from_millis(200))).await;

        // Assert
        assert!(matches!(result, Err(ControllerError::DiscoveryTimeout(_))));
    }
}
