//! Video channel receiver.
//!
//! ```text
//! connect ──▶ read descriptor line ──▶ next_frame() ... ──▶ None (host closed)
//! ```
//!
//! Frames are `[4-byte big-endian length][payload]` with no type marker.
//! The receiver refuses headers above its `max_frame_len` so a corrupt
//! stream cannot make it allocate gigabytes.

use std::net::SocketAddr;

use mirror_core::protocol::descriptor::MAX_DESCRIPTOR_LINE;
use mirror_core::protocol::{decode_frame_header, VideoDescriptor, FRAME_HEADER_SIZE};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::ControllerError;

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// An open video connection.
pub struct VideoReceiver {
    reader: BufReader<TcpStream>,
    descriptor: VideoDescriptor,
    max_frame_len: usize,
    frames_received: u64,
    bytes_received: u64,
}

impl VideoReceiver {
    /// Connects to the host's video port and reads the descriptor line.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ConnectFailed`] if the host is unreachable
    /// and a framing or size error if the descriptor line is malformed.
    pub async fn connect(addr: SocketAddr, max_frame_len: usize) -> Result<Self, ControllerError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ControllerError::ConnectFailed { addr, source })?;
        let mut reader = BufReader::new(stream);

        let mut line = Vec::with_capacity(128);
        (&mut reader)
            .take(MAX_DESCRIPTOR_LINE as u64)
            .read_until(b'\n', &mut line)
            .await?;
        match line.last() {
            Some(b'\n') => {}
            None => return Err(ControllerError::Closed),
            Some(_) if line.len() >= MAX_DESCRIPTOR_LINE => {
                return Err(ControllerError::DescriptorTooLong(MAX_DESCRIPTOR_LINE))
            }
            Some(_) => return Err(ControllerError::Closed),
        }
        let descriptor = VideoDescriptor::from_line(&line)?;
        info!(
            "video stream from {addr}: {}x{} {}",
            descriptor.width, descriptor.height, descriptor.codec
        );

        Ok(Self {
            reader,
            descriptor,
            max_frame_len,
            frames_received: 0,
            bytes_received: 0,
        })
    }

    pub fn descriptor(&self) -> &VideoDescriptor {
        &self.descriptor
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Payload bytes received, headers excluded.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Waits for the next frame.
    ///
    /// Returns `Ok(None)` when the host closes the connection between frames.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the host closes mid-frame and
    /// [`ControllerError::FrameTooLarge`] if the header exceeds the limit.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ControllerError> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let mut filled = 0;
        while filled < FRAME_HEADER_SIZE {
            match self.reader.read(&mut header[filled..]).await? {
                0 if filled == 0 => {
                    debug!("video stream ended after {} frames", self.frames_received);
                    return Ok(None);
                }
                0 => return Err(ControllerError::Closed),
                n => filled += n,
            }
        }

        let len = decode_frame_header(header);
        if len > self.max_frame_len {
            return Err(ControllerError::FrameTooLarge {
                len,
                limit: self.max_frame_len,
            });
        }

        let mut payload = vec![0u8; len];
        self.reader
            .read_exact(&mut payload)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ControllerError::Closed,
                _ => ControllerError::Io(e),
            })?;
        self.frames_received += 1;
        self.bytes_received += len as u64;
        Ok(Some(payload))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Serves `script` to the first connection, then closes it.
    async fn scripted_host(script: Vec<u8>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&script).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        addr
    }

    fn descriptor_line() -> Vec<u8> {
        VideoDescriptor::default().to_line().unwrap()
    }

    #[tokio::test]
    async fn test_receiver_parses_descriptor_and_frames() {
        // Arrange
        let mut script = descriptor_line();
        script.extend_from_slice(&[0, 0, 0, 3, 0xAA, 0xBB, 0xCC]);
        script.extend_from_slice(&[0, 0, 0, 0]);
        let addr = scripted_host(script).await;

        // Act
        let mut rx = VideoReceiver::connect(addr, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        let first = rx.next_frame().await.unwrap();
        let second = rx.next_frame().await.unwrap();
        let end = rx.next_frame().await.unwrap();

        // Assert
        assert_eq!(rx.descriptor(), &VideoDescriptor::default());
        assert_eq!(first, Some(vec![0xAA, 0xBB, 0xCC]));
        assert_eq!(second, Some(Vec::new()));
        assert_eq!(end, None);
        assert_eq!(rx.frames_received(), 2);
        assert_eq!(rx.bytes_received(), 3);
    }

    #[tokio::test]
    async fn test_receiver_reports_truncated_frame() {
        // Arrange
        let mut script = descriptor_line();
        script.extend_from_slice(&[0, 0, 0, 5, 1, 2]);
        let addr = scripted_host(script).await;

        // Act
        let mut rx = VideoReceiver::connect(addr, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        let result = rx.next_frame().await;

        // Assert
        assert!(matches!(result, Err(ControllerError::Closed)));
    }

    #[tokio::test]
    async fn test_receiver_rejects_oversized_frame() {
        // Arrange
        let mut script = descriptor_line();
        script.extend_from_slice(&[0, 0, 1, 0]);
        let addr = scripted_host(script).await;

        // Act
        let mut rx = VideoReceiver::connect(addr, 255).await.unwrap();
        let result = rx.next_frame().await;

        // Assert
        assert!(matches!(
            result,
            Err(ControllerError::FrameTooLarge { len: 256, limit: 255 })
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_when_host_closes_before_descriptor() {
        let addr = scripted_host(Vec::new()).await;
        let result = VideoReceiver::connect(addr, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(ControllerError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_descriptor() {
        let addr = scripted_host(b"width=1280\n".to_vec()).await;
        let result = VideoReceiver::connect(addr, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(ControllerError::Framing(_))));
    }
}
