//! Control channel: accept loop and per-connection worker.
//!
//! # Connection lifecycle
//!
//! ```text
//! Accepted ──▶ Pairing ──match──▶ Streaming ──EOF / error──▶ Closed
//!                 └──────────────any failure───────────────▶ Closed
//! ```
//!
//! The accept loop owns the listener.  Each accepted stream is installed in
//! the channel's [`ConnectionSlot`], which shuts the previous peer down, and
//! the previous worker is joined before the new one is spawned.  So the old
//! connection is fully gone before the new peer sees its challenge.
//!
//! # Streaming
//!
//! After pairing, the worker reads fixed 17-byte records.  A zero-byte read
//! is a graceful close.  A short read (the peer closed mid-record) is logged
//! and dropped without decoding.  Every full record is decoded and handed to
//! the [`InputSink`] synchronously, in arrival order.  A sink error is logged
//! and the stream continues.
//!
//! The worker is the only thread that runs sink code.  It records its
//! [`ThreadId`] in the context so the session can recognise a `stop()` issued
//! from inside a sink callback and avoid joining threads that wait on it.

use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use mirror_core::protocol::{decode_control_record, CONTROL_EVENT_SIZE};
use mirror_core::PairingCode;
use tracing::{debug, error, info, warn};

use super::connection_slot::{ActiveConnection, ConnectionSlot};
use super::framed_io::read_full;
use super::pairing_gate::run_pairing_gate;
use crate::application::inject_input::InputSink;

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Counters for one streaming connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Records decoded and handed to the sink.
    pub dispatched: u64,
    /// Short records dropped without decoding.
    pub dropped: u64,
    /// Dispatched records the sink reported an error for.
    pub sink_errors: u64,
}

/// Everything a control worker needs, shared across connections.
#[derive(Clone)]
pub struct ControlContext {
    pub slot: Arc<ConnectionSlot>,
    pub code: PairingCode,
    pub sink: Arc<dyn InputSink>,
    pub running: Arc<AtomicBool>,
    worker_thread: Arc<Mutex<Option<ThreadId>>>,
}

impl ControlContext {
    pub fn new(
        slot: Arc<ConnectionSlot>,
        code: PairingCode,
        sink: Arc<dyn InputSink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            slot,
            code,
            sink,
            running,
            worker_thread: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether the calling thread is (or was) this channel's most recent
    /// connection worker.
    pub fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        *self
            .worker_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(current)
    }

    fn mark_worker_thread(&self) {
        *self
            .worker_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
    }
}

/// Accepts control connections until `running` is cleared.
///
/// On exit the live connection (if any) is closed and its worker joined.
pub fn run_control_accept_loop(listener: TcpListener, ctx: ControlContext) {
    match listener.local_addr() {
        Ok(addr) => info!("control channel listening on TCP {addr}"),
        Err(e) => debug!("control listener address unavailable: {e}"),
    }
    let mut worker: Option<JoinHandle<()>> = None;

    while ctx.running.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) => {
                if !ctx.running.load(Ordering::SeqCst) {
                    break;
                }
                warn!("control accept failed: {e}");
                thread::sleep(ACCEPT_RETRY_DELAY);
                continue;
            }
        };

        if !ctx.running.load(Ordering::SeqCst) {
            debug!("dropping control connection from {peer} during shutdown");
            break;
        }

        let (conn, superseded) = ctx.slot.replace(stream, peer);
        if let Some(old) = superseded {
            info!("control connection from {peer} supersedes {old}");
        } else {
            info!("control connection from {peer}");
        }
        join_worker(worker.take());

        if !ctx.running.load(Ordering::SeqCst) {
            debug!("session stopped while {peer} was waiting for its predecessor");
            break;
        }
        worker = spawn_worker(conn, ctx.clone());
    }

    ctx.slot.close();
    join_worker(worker.take());
    info!("control channel stopped");
}

fn spawn_worker(conn: ActiveConnection, ctx: ControlContext) -> Option<JoinHandle<()>> {
    let generation = conn.generation;
    let peer = conn.peer;
    let slot = Arc::clone(&ctx.slot);
    match thread::Builder::new()
        .name("control-conn".into())
        .spawn(move || serve_connection(conn, ctx))
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("failed to spawn control worker for {peer}: {e}");
            slot.release(generation);
            None
        }
    }
}

fn join_worker(worker: Option<JoinHandle<()>>) {
    if let Some(handle) = worker {
        if handle.join().is_err() {
            error!("control worker panicked");
        }
    }
}

/// Runs the pairing gate and then streams events for one connection.
fn serve_connection(conn: ActiveConnection, ctx: ControlContext) {
    ctx.mark_worker_thread();
    let peer = conn.peer;
    let mut stream: &TcpStream = &conn.stream;

    if let Err(e) = run_pairing_gate(&mut stream, &ctx.code) {
        if ctx.running.load(Ordering::SeqCst) && ctx.slot.is_current(conn.generation) {
            warn!("pairing with {peer} failed: {e}");
        } else {
            debug!("pairing with {peer} interrupted: {e}");
        }
        ctx.slot.release(conn.generation);
        return;
    }
    info!("control peer {peer} paired");

    match stream_events(&mut stream, ctx.sink.as_ref()) {
        Ok(summary) => info!(
            "control peer {peer} disconnected after {} events ({} dropped)",
            summary.dispatched, summary.dropped
        ),
        Err(e) => {
            if ctx.running.load(Ordering::SeqCst) && ctx.slot.is_current(conn.generation) {
                warn!("control read from {peer} failed: {e}");
            } else {
                debug!("control connection from {peer} closed: {e}");
            }
        }
    }
    ctx.slot.release(conn.generation);
}

/// Reads 17-byte records from `reader` until it closes, dispatching each to
/// `sink`.
///
/// # Errors
///
/// Returns the underlying read error; the caller treats it as end of stream.
pub fn stream_events<R: Read>(
    reader: &mut R,
    sink: &dyn InputSink,
) -> io::Result<StreamSummary> {
    let mut summary = StreamSummary::default();
    let mut record = [0u8; CONTROL_EVENT_SIZE];

    loop {
        match read_full(reader, &mut record)? {
            0 => return Ok(summary),
            CONTROL_EVENT_SIZE => {}
            n => {
                warn!("dropping {n}-byte control record");
                summary.dropped += 1;
                continue;
            }
        }

        summary.dispatched += 1;
        if let Err(e) = sink.on_control_event(decode_control_record(&record)) {
            warn!("input sink rejected event: {e}");
            summary.sink_errors += 1;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
