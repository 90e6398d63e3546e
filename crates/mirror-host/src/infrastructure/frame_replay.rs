//! Synthetic encoder: replays a recorded frame dump into the video channel.
//!
//! A dump is the video wire stream without its descriptor line, i.e. a
//! sequence of `[4-byte big-endian length][payload]` records.  A controller
//! can produce one by saving what it receives.  The replayer loops over the
//! frames at a fixed rate until it is stopped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mirror_core::protocol::{decode_frame_header, FRAME_HEADER_SIZE};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for loading frame dumps.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read frame dump {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("frame dump truncated at byte {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("frame dump contains no frames")]
    Empty,
    #[error("replay rate must be greater than zero")]
    ZeroFps,
    #[error("failed to spawn replay thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Splits a dump into its frame payloads.
///
/// # Errors
///
/// Returns [`ReplayError::Truncated`] if the last record is incomplete and
/// [`ReplayError::Empty`] if there are no records.
pub fn parse_frame_dump(bytes: &[u8]) -> Result<Vec<Vec<u8>>, ReplayError> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let Some(header) = rest.get(..FRAME_HEADER_SIZE) else {
            return Err(ReplayError::Truncated {
                offset,
                needed: FRAME_HEADER_SIZE - rest.len(),
            });
        };
        let mut len_bytes = [0u8; FRAME_HEADER_SIZE];
        len_bytes.copy_from_slice(header);
        let len = decode_frame_header(len_bytes);

        let body = &rest[FRAME_HEADER_SIZE..];
        if body.len() < len {
            return Err(ReplayError::Truncated {
                offset,
                needed: len - body.len(),
            });
        }
        frames.push(body[..len].to_vec());
        offset += FRAME_HEADER_SIZE + len;
    }
    if frames.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(frames)
}

/// Reads and parses a dump file.
///
/// # Errors
///
/// See [`parse_frame_dump`]; file-system failures map to [`ReplayError::Io`].
pub fn load_frame_dump(path: &Path) -> Result<Vec<Vec<u8>>, ReplayError> {
    let bytes = std::fs::read(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_frame_dump(&bytes)
}

/// A running replay thread.
pub struct FrameReplayer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl FrameReplayer {
    /// Starts pushing `frames` in a loop, `fps` frames per second.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Empty`] for an empty frame list,
    /// [`ReplayError::ZeroFps`] for a zero rate, and [`ReplayError::Spawn`]
    /// if the thread cannot be started.
    pub fn spawn<F>(frames: Vec<Vec<u8>>, fps: u32, push: F) -> Result<Self, ReplayError>
    where
        F: Fn(&[u8]) + Send + 'static,
    {
        if frames.is_empty() {
            return Err(ReplayError::Empty);
        }
        if fps == 0 {
            return Err(ReplayError::ZeroFps);
        }
        let interval = Duration::from_secs(1) / fps;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("frame-replay".into())
            .spawn(move || replay_loop(&frames, interval, &flag, push))
            .map_err(ReplayError::Spawn)?;
        info!("replaying frames at {fps} fps");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the replay and returns how many frames were pushed.
    pub fn stop(mut self) -> u64 {
        self.halt()
    }

    fn halt(&mut self) -> u64 {
        self.stop.store(true, Ordering::SeqCst);
        self.handle
            .take()
            .map(|h| h.join().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Drop for FrameReplayer {
    fn drop(&mut self) {
        self.halt();
    }
}

fn replay_loop<F: Fn(&[u8])>(
    frames: &[Vec<u8>],
    interval: Duration,
    stop: &AtomicBool,
    push: F,
) -> u64 {
    let mut pushed = 0u64;
    let mut next = Instant::now();
    for frame in frames.iter().cycle() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        push(frame);
        pushed += 1;

        next += interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            next = now;
        }
    }
    debug!("frame replay stopped after {pushed} frames");
    pushed
}

// ── Tests ─────────────────────────────────────────────────────────────────────
