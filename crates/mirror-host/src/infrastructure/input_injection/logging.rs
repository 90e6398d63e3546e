//! An input sink that only logs what it receives.

use std::sync::atomic::{AtomicU64, Ordering};

use mirror_core::protocol::EventKind;
use mirror_core::ControlEvent;
use tracing::{debug, info};

use crate::application::inject_input::{InjectionError, InputSink};

/// Logs every event at `info` (pings at `debug`) and counts them.
#[derive(Debug, Default)]
pub struct LoggingInputSink {
    received: AtomicU64,
}

impl LoggingInputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events seen since construction.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl InputSink for LoggingInputSink {
    fn on_control_event(&self, event: ControlEvent) -> Result<(), InjectionError> {
        self.received.fetch_add(1, Ordering::Relaxed);
        match event.kind() {
            Some(EventKind::Ping) => debug!("ping from controller, timestamp {}", event.x),
            Some(EventKind::Mouse) => info!(
                "mouse action={} button={} at ({}, {})",
                event.action, event.keycode, event.x, event.y
            ),
            Some(EventKind::Key) => info!("key action={} keycode={}", event.action, event.keycode),
            None => info!(
                "event tag=0x{:02x} x={} y={} keycode={} action={}",
                event.event_type, event.x, event.y, event.keycode, event.action
            ),
        }
        Ok(())
    }
}
