//! The input-injection seam.
//!
//! The control channel decodes records and hands each [`ControlEvent`] to an
//! [`InputSink`].  Turning events into real OS input is the sink's business;
//! the core never interprets tags or actions.

use mirror_core::ControlEvent;
use thiserror::Error;

/// Error type for input injection.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("platform error: {0}")]
    Platform(String),
}

/// Consumer of decoded control events.
///
/// Called synchronously from the control connection's thread, once per
/// event, in arrival order.  Only events from a paired connection arrive.
pub trait InputSink: Send + Sync {
    fn on_control_event(&self, event: ControlEvent) -> Result<(), InjectionError>;
}
