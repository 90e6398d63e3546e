//! Video channel: descriptor handshake, frame pushing, and liveness polling.
//!
//! # Connection lifecycle
//!
//! ```text
//! Accepted ──▶ HandshakeSent ──▶ Streaming ──peer close / send failure──▶ Closed
//! ```
//!
//! The accept loop hands every new stream to [`VideoChannel::attach`], which
//! closes the previous peer, installs the new one, and writes the descriptor
//! line.  A monitor thread then peeks the socket every
//! [`LIVENESS_POLL_INTERVAL`] to notice when the peer goes away.
//!
//! Frames arrive from outside through [`VideoChannel::send_frame`] on
//! whatever thread the encoder runs on.  Sends and handshakes take the same
//! lock, so a new peer always sees its descriptor before its first frame.
//!
//! Both the monitor and a failed send may try to drop the peer.  Both release
//! by generation through the [`ConnectionSlot`], so only the first one closes
//! it and neither can touch a newer peer.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mirror_core::protocol::{encode_video_frame, FramingError, VideoDescriptor};
use tracing::{debug, error, info, warn};

use super::connection_slot::{ActiveConnection, ConnectionSlot};
use super::framed_io::is_timeout_error;

/// How often the monitor checks whether the video peer is still there.
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Outcome of one [`VideoChannel::send_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDelivery {
    /// The whole frame was written to the live peer.
    Sent,
    /// No peer is connected; the frame was discarded.
    NoPeer,
    /// The write failed; the peer has been dropped.
    Failed,
    /// The payload cannot be framed (longer than `u32::MAX`).
    Rejected,
}

/// The video push target shared by the accept loop, its monitor, the
/// encoder, and the session.
#[derive(Debug)]
pub struct VideoChannel {
    slot: ConnectionSlot,
    send_lock: Mutex<()>,
    descriptor_line: Vec<u8>,
    frames_sent: AtomicU64,
}

impl VideoChannel {
    /// Creates a channel that greets every peer with `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::MalformedDescriptor`] if the descriptor cannot
    /// be serialised.
    pub fn new(descriptor: &VideoDescriptor) -> Result<Self, FramingError> {
        Ok(Self {
            slot: ConnectionSlot::new(),
            send_lock: Mutex::new(()),
            descriptor_line: descriptor.to_line()?,
            frames_sent: AtomicU64::new(0),
        })
    }

    /// Makes `stream` the live peer and sends it the descriptor line.
    ///
    /// Returns the installed connection, or `None` if the handshake write
    /// failed (the stream is already closed in that case).
    pub fn attach(&self, stream: TcpStream, peer: SocketAddr) -> Option<ActiveConnection> {
        // Closing first unblocks a send stuck on a stalled old peer.
        if let Some(old) = self.slot.current() {
            info!("video connection from {peer} supersedes {}", old.peer);
            self.slot.close();
        } else {
            info!("video connection from {peer}");
        }

        let _guard = self.lock_send();
        let (conn, _) = self.slot.replace(stream, peer);
        match (&*conn.stream).write_all(&self.descriptor_line) {
            Ok(()) => {
                debug!("sent video descriptor to {peer}");
                Some(conn)
            }
            Err(e) => {
                warn!("video handshake with {peer} failed: {e}");
                self.slot.release(conn.generation);
                None
            }
        }
    }

    /// Writes one `[length][payload]` frame to the live peer, if any.
    ///
    /// A failed write drops the peer; later calls return
    /// [`FrameDelivery::NoPeer`] until a new one connects.
    pub fn send_frame(&self, payload: &[u8]) -> FrameDelivery {
        let _guard = self.lock_send();
        let Some(conn) = self.slot.current() else {
            return FrameDelivery::NoPeer;
        };

        let frame = match encode_video_frame(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("discarding video frame: {e}");
                return FrameDelivery::Rejected;
            }
        };

        match (&*conn.stream).write_all(&frame) {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                FrameDelivery::Sent
            }
            Err(e) => {
                if self.slot.release(conn.generation) {
                    warn!("video send to {} failed, dropping peer: {e}", conn.peer);
                }
                FrameDelivery::Failed
            }
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.slot.current().map(|conn| conn.peer)
    }

    /// Total frames delivered across all peers.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Closes the live peer, if any.  Returns `true` if there was one.
    pub fn close(&self) -> bool {
        self.slot.close()
    }

    fn lock_send(&self) -> MutexGuard<'_, ()> {
        self.send_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accepts video connections until `running` is cleared.
pub fn run_video_accept_loop(
    listener: TcpListener,
    channel: Arc<VideoChannel>,
    running: Arc<AtomicBool>,
) {
    match listener.local_addr() {
        Ok(addr) => info!("video channel listening on TCP {addr}"),
        Err(e) => debug!("video listener address unavailable: {e}"),
    }
    let mut monitor: Option<JoinHandle<()>> = None;

    while running.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                warn!("video accept failed: {e}");
                thread::sleep(ACCEPT_RETRY_DELAY);
                continue;
            }
        };

        if !running.load(Ordering::SeqCst) {
            debug!("dropping video connection from {peer} during shutdown");
            break;
        }

        let Some(conn) = channel.attach(stream, peer) else {
            continue;
        };
        join_monitor(monitor.take());

        let generation = conn.generation;
        let monitor_channel = Arc::clone(&channel);
        let monitor_running = Arc::clone(&running);
        monitor = match thread::Builder::new()
            .name("video-monitor".into())
            .spawn(move || monitor_liveness(&monitor_channel, conn, &monitor_running))
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("failed to spawn video monitor for {peer}: {e}");
                channel.slot.release(generation);
                None
            }
        };
    }

    channel.close();
    join_monitor(monitor.take());
    info!("video channel stopped");
}

fn join_monitor(monitor: Option<JoinHandle<()>>) {
    if let Some(handle) = monitor {
        if handle.join().is_err() {
            error!("video monitor panicked");
        }
    }
}

/// Peeks the peer every poll interval until it closes, is replaced, or the
/// session stops.
fn monitor_liveness(channel: &VideoChannel, conn: ActiveConnection, running: &AtomicBool) {
    let peer = conn.peer;
    if let Err(e) = conn.stream.set_read_timeout(Some(LIVENESS_POLL_INTERVAL)) {
        warn!("cannot poll video peer {peer}: {e}");
        channel.slot.release(conn.generation);
        return;
    }

    let mut probe = [0u8; 1];
    while running.load(Ordering::SeqCst) && channel.slot.is_current(conn.generation) {
        match conn.stream.peek(&mut probe) {
            Ok(0) => {
                info!("video peer {peer} disconnected");
                break;
            }
            // The video channel is one-way; stray bytes are left unread.
            Ok(_) => thread::sleep(LIVENESS_POLL_INTERVAL),
            Err(e) if is_timeout_error(&e) => {}
            Err(e) => {
                if running.load(Ordering::SeqCst) && channel.slot.is_current(conn.generation) {
                    warn!("video peer {peer} poll failed: {e}");
                } else {
                    debug!("video connection from {peer} closed: {e}");
                }
                break;
            }
        }
    }

    channel.slot.release(conn.generation);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
