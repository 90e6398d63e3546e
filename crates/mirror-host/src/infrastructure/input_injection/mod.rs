//! [`InputSink`](crate::application::inject_input::InputSink) implementations.
//!
//! Real OS-level injection lives outside this crate.  The host binary uses
//! [`logging::LoggingInputSink`]; tests use [`recording::RecordingInputSink`].

pub mod logging;
pub mod recording;

pub use logging::LoggingInputSink;
pub use recording::RecordingInputSink;
