//! Session lifecycle: start, stop, and the external frame-push entry point.
//!
//! A [`SessionController`] owns one running/stopped state.  `start()` binds
//! the video and control listeners and the discovery socket, generates the
//! session's [`PairingCode`], and launches one background thread per
//! channel.  `stop()` tears all of that down and returns only after every
//! thread has exited.
//!
//! # Shutdown order
//!
//! 1. Clear the session's `running` flag.
//! 2. Shut down any live video and control peers.
//! 3. Wake both accept loops with a throwaway loopback connection.
//! 4. Wake the discovery loop with a throwaway datagram.
//! 5. Join every thread.
//!
//! Each loop re-checks `running` after waking, so errors caused by step 2 are
//! never reported as faults.
//!
//! The state lock is only held to swap the lifecycle state, never across the
//! joins.  While a stop is in flight the session reports itself as not
//! running, and `start()` fails with [`SessionError::Stopping`].
//!
//! # Stopping from an input sink
//!
//! The control worker runs [`InputSink`] callbacks, and the control accept
//! loop joins that worker on exit.  When `stop()` is called from inside a
//! callback it therefore leaves the control accept loop unjoined; the loop
//! exits on its own once the callback returns.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mirror_core::protocol::{
    FramingError, VideoDescriptor, DEFAULT_CONTROL_PORT, DEFAULT_DISCOVERY_PORT, DEFAULT_VIDEO_PORT,
};
use mirror_core::PairingCode;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::application::inject_input::InputSink;
use crate::infrastructure::network::connection_slot::ConnectionSlot;
use crate::infrastructure::network::control_channel::{run_control_accept_loop, ControlContext};
use crate::infrastructure::network::discovery::{
    wake_discovery, DiscoveryError, DiscoveryResponder,
};
use crate::infrastructure::network::video_channel::{
    run_video_accept_loop, FrameDelivery, VideoChannel,
};
use crate::infrastructure::network::{local_wake_addr, ChannelKind};

/// How long `stop()` waits for each listener wake connection.
const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

const CONTROL_ACCEPT_THREAD: &str = "control-accept";

/// Error type for session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is already running")]
    AlreadyRunning,

    #[error("session is still stopping")]
    Stopping,

    #[error("failed to bind {channel} listener on {addr}: {source}")]
    Bind {
        channel: ChannelKind,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("invalid video descriptor: {0}")]
    Descriptor(#[from] FramingError),

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Where and how the session listens.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub bind_address: IpAddr,
    pub video_port: u16,
    pub control_port: u16,
    pub discovery_port: u16,
    /// Advertised to every video peer in the handshake line.
    pub descriptor: VideoDescriptor,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            video_port: DEFAULT_VIDEO_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            descriptor: VideoDescriptor::default(),
        }
    }
}

impl SessionConfig {
    /// Loopback-only, OS-assigned ports.  Used by tests and local demos.
    pub fn ephemeral_loopback() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            video_port: 0,
            control_port: 0,
            discovery_port: 0,
            descriptor: VideoDescriptor::default(),
        }
    }

    fn addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_address, port)
    }
}

/// The addresses a running session actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAddrs {
    pub video: SocketAddr,
    pub control: SocketAddr,
    pub discovery: SocketAddr,
}

struct RunningSession {
    addrs: LocalAddrs,
    control: ControlContext,
    threads: Vec<JoinHandle<()>>,
}

impl RunningSession {
    fn shutdown(mut self, video: &VideoChannel) {
        self.control.running.store(false, Ordering::SeqCst);

        video.close();
        self.control.slot.close();

        wake_listener(self.addrs.video);
        wake_listener(self.addrs.control);
        wake_discovery(self.addrs.discovery);

        let caller = thread::current().id();
        let from_sink = self.control.is_worker_thread();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("session").to_string();
            if handle.thread().id() == caller {
                continue;
            }
            if from_sink && name == CONTROL_ACCEPT_THREAD {
                debug!("{name} will exit after the current input callback returns");
                continue;
            }
            if handle.join().is_err() {
                error!("{name} thread panicked");
            }
        }
    }
}

enum Lifecycle {
    Stopped,
    Running(RunningSession),
    Stopping,
}

impl Lifecycle {
    fn running(&self) -> Option<&RunningSession> {
        match self {
            Lifecycle::Running(session) => Some(session),
            Lifecycle::Stopped | Lifecycle::Stopping => None,
        }
    }
}

/// Owns the host's session lifecycle.
pub struct SessionController {
    config: SessionConfig,
    sink: Arc<dyn InputSink>,
    video: Arc<VideoChannel>,
    state: Mutex<Lifecycle>,
}

impl SessionController {
    /// Creates a stopped session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Descriptor`] if the configured descriptor
    /// cannot be serialised.
    pub fn new(config: SessionConfig, sink: Arc<dyn InputSink>) -> Result<Self, SessionError> {
        let video = Arc::new(VideoChannel::new(&config.descriptor)?);
        Ok(Self {
            config,
            sink,
            video,
            state: Mutex::new(Lifecycle::Stopped),
        })
    }

    /// Binds every socket and launches the background loops.
    ///
    /// Nothing is left running if this fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyRunning`] if called twice,
    /// [`SessionError::Stopping`] while a `stop()` on another thread is still
    /// joining, a bind error if any socket cannot be bound, or
    /// [`SessionError::Spawn`] if a thread cannot be started.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut state = self.lock_state();
        match *state {
            Lifecycle::Stopped => {}
            Lifecycle::Running(_) => return Err(SessionError::AlreadyRunning),
            Lifecycle::Stopping => return Err(SessionError::Stopping),
        }

        let config = &self.config;
        let video_listener = bind_listener(ChannelKind::Video, config.addr(config.video_port))?;
        let control_listener =
            bind_listener(ChannelKind::Control, config.addr(config.control_port))?;
        let discovery = DiscoveryResponder::bind(config.addr(config.discovery_port))?;
        let addrs = LocalAddrs {
            video: listener_addr(ChannelKind::Video, &video_listener, config.video_port)?,
            control: listener_addr(ChannelKind::Control, &control_listener, config.control_port)?,
            discovery: discovery.local_addr(),
        };

        let running = Arc::new(AtomicBool::new(true));
        let control_ctx = ControlContext::new(
            Arc::new(ConnectionSlot::new()),
            PairingCode::generate(),
            Arc::clone(&self.sink),
            Arc::clone(&running),
        );
        let mut session = RunningSession {
            addrs,
            control: control_ctx.clone(),
            threads: Vec::with_capacity(3),
        };

        let discovery_running = Arc::clone(&running);
        let video = Arc::clone(&self.video);
        let video_running = running;

        let tasks: [(&'static str, Box<dyn FnOnce() + Send>); 3] = [
            ("discovery", Box::new(move || discovery.run(discovery_running))),
            (
                "video-accept",
                Box::new(move || run_video_accept_loop(video_listener, video, video_running)),
            ),
            (
                CONTROL_ACCEPT_THREAD,
                Box::new(move || run_control_accept_loop(control_listener, control_ctx)),
            ),
        ];
        for (name, task) in tasks {
            match spawn_named(name, task) {
                Ok(handle) => session.threads.push(handle),
                Err(e) => {
                    error!("session start aborted: {e}");
                    session.shutdown(&self.video);
                    return Err(e);
                }
            }
        }

        info!(
            "session started (video {}, control {}, discovery {})",
            addrs.video, addrs.control, addrs.discovery
        );
        *state = Lifecycle::Running(session);
        Ok(())
    }

    /// Stops the session and waits for its loops to exit.
    ///
    /// Does nothing if the session is not running or another `stop()` is
    /// already in progress.  Safe to call from any thread, including from
    /// inside an [`InputSink`] callback, where the calling connection's
    /// worker and the control accept loop finish after the callback returns.
    pub fn stop(&self) {
        let taken = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, Lifecycle::Stopping) {
                Lifecycle::Running(session) => session,
                other => {
                    *state = other;
                    debug!("stop requested while not running");
                    return;
                }
            }
        };

        taken.shutdown(&self.video);
        *self.lock_state() = Lifecycle::Stopped;
        info!("session stopped");
    }

    /// Pushes one encoded frame to the live video peer, if any.
    pub fn push_video_frame(&self, payload: &[u8]) -> FrameDelivery {
        self.video.send_frame(payload)
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running().is_some()
    }

    /// The current session's pairing code.
    pub fn pairing_code(&self) -> Option<PairingCode> {
        self.lock_state().running().map(|s| s.control.code)
    }

    /// The bound addresses of the current session.
    pub fn local_addrs(&self) -> Option<LocalAddrs> {
        self.lock_state().running().map(|s| s.addrs)
    }

    pub fn video_peer(&self) -> Option<SocketAddr> {
        self.video.peer()
    }

    /// The live control peer, paired or still answering the challenge.
    pub fn control_peer(&self) -> Option<SocketAddr> {
        let slot = Arc::clone(&self.lock_state().running()?.control.slot);
        slot.current().map(|conn| conn.peer)
    }

    /// Frames delivered since this controller was created.
    pub fn frames_sent(&self) -> u64 {
        self.video.frames_sent()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind_listener(channel: ChannelKind, addr: SocketAddr) -> Result<TcpListener, SessionError> {
    TcpListener::bind(addr).map_err(|source| SessionError::Bind {
        channel,
        addr,
        source,
    })
}

fn listener_addr(
    channel: ChannelKind,
    listener: &TcpListener,
    port: u16,
) -> Result<SocketAddr, SessionError> {
    listener.local_addr().map_err(|source| SessionError::Bind {
        channel,
        addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        source,
    })
}

fn spawn_named<F>(name: &'static str, f: F) -> Result<JoinHandle<()>, SessionError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|source| SessionError::Spawn {
            thread: name,
            source,
        })
}

/// Opens and drops one connection to the listener at `bound` so a pending
/// `accept` returns.
fn wake_listener(bound: SocketAddr) {
    let target = local_wake_addr(bound);
    if let Err(e) = TcpStream::connect_timeout(&target, WAKE_CONNECT_TIMEOUT) {
        debug!("listener wake connection to {target} failed: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
