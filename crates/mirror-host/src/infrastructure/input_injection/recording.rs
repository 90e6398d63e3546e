//! In-memory input sink for tests.
//!
//! Each dispatched event is pushed into a `Mutex<Vec<_>>` so assertions can
//! check exactly what arrived and in what order.  Events are dispatched from
//! the control connection's thread, so tests that drive a live session use
//! [`RecordingInputSink::wait_for`] instead of sleeping.
//!
//! Set `should_fail` to make every call return [`InjectionError::Platform`]
//! (the event is still recorded) to exercise the host's error path.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mirror_core::ControlEvent;

use crate::application::inject_input::{InjectionError, InputSink};

#[derive(Debug, Default)]
pub struct RecordingInputSink {
    events: Mutex<Vec<ControlEvent>>,
    arrived: Condvar,
    /// When `true`, every call reports a platform failure.
    pub should_fail: bool,
}

impl RecordingInputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every call fails after recording the event.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// A copy of every event received so far.
    pub fn snapshot(&self) -> Vec<ControlEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Blocks until at least `count` events have arrived or `timeout`
    /// elapses, then returns what has arrived.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ControlEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.lock();
        while events.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            events = match self.arrived.wait_timeout(events, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ControlEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputSink for RecordingInputSink {
    fn on_control_event(&self, event: ControlEvent) -> Result<(), InjectionError> {
        self.lock().push(event);
        self.arrived.notify_all();
        if self.should_fail {
            return Err(InjectionError::Platform("recording sink set to fail".into()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
