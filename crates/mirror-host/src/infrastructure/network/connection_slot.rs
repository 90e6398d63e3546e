//! The guarded single-connection handle shared by a channel's actors.
//!
//! Each TCP channel holds at most one live peer.  Several parties touch that
//! peer concurrently: the accept loop installs and replaces it, the
//! connection's worker thread reads from it, an external producer writes to
//! it (video), and the session's shutdown path closes it.  All of them go
//! through a [`ConnectionSlot`].
//!
//! # Generations
//!
//! Every installed connection gets a fresh generation number.  Workers and
//! producers only ever *release* the generation they were handed, so a worker
//! that notices its peer went away can never close the connection that has
//! since replaced it.
//!
//! # Closing
//!
//! Removing a connection from the slot also calls `shutdown(Both)` on it.
//! That makes any thread blocked in `read`, `peek`, or `write` on the same
//! socket return immediately.  The descriptor itself is closed when the last
//! `Arc` clone is dropped, so it can never be closed twice.

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// A connection currently (or formerly) installed in a slot.
#[derive(Debug, Clone)]
pub struct ActiveConnection {
    pub generation: u64,
    pub peer: SocketAddr,
    pub stream: Arc<TcpStream>,
}

/// Mutex-guarded `Option<ActiveConnection>` with generation-checked release.
#[derive(Debug, Default)]
pub struct ConnectionSlot {
    inner: Mutex<Option<ActiveConnection>>,
    next_generation: AtomicU64,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `stream` as the live connection.
    ///
    /// Whatever connection was installed before is shut down before this
    /// returns; its peer address is handed back for logging.
    pub fn replace(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> (ActiveConnection, Option<SocketAddr>) {
        let conn = ActiveConnection {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            peer,
            stream: Arc::new(stream),
        };
        let previous = self.lock().replace(conn.clone());
        let superseded = previous.map(|old| {
            shutdown_quietly(&old);
            old.peer
        });
        (conn, superseded)
    }

    /// A clone of the live connection, if any.
    pub fn current(&self) -> Option<ActiveConnection> {
        self.lock().clone()
    }

    /// Whether `generation` is still the live connection.
    pub fn is_current(&self, generation: u64) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|conn| conn.generation == generation)
    }

    /// Removes and shuts down the connection only if it is still `generation`.
    ///
    /// Returns `true` if this call closed it.
    pub fn release(&self, generation: u64) -> bool {
        let mut guard = self.lock();
        match guard.as_ref() {
            Some(conn) if conn.generation == generation => {
                if let Some(conn) = guard.take() {
                    shutdown_quietly(&conn);
                }
                true
            }
            _ => false,
        }
    }

    /// Removes and shuts down whatever connection is installed.
    ///
    /// Returns `true` if there was one.
    pub fn close(&self) -> bool {
        let taken = self.lock().take();
        match taken {
            Some(conn) => {
                shutdown_quietly(&conn);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shuts both directions down; errors (typically `NotConnected` after the
/// peer already left) carry no information here.
fn shutdown_quietly(conn: &ActiveConnection) {
    if let Err(e) = conn.stream.shutdown(Shutdown::Both) {
        debug!("shutdown of connection from {} reported: {e}", conn.peer);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
