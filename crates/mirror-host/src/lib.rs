//! mirror-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does mirror-host do?
//!
//! The *host* is the device whose screen is mirrored and whose input is
//! driven remotely.  While a session runs it:
//!
//! 1. Answers UDP discovery probes so controllers can find it.
//! 2. Accepts one video connection at a time, sends the stream descriptor,
//!    and pushes every frame an external encoder hands it.
//! 3. Accepts one control connection at a time, challenges it with the
//!    session PIN, and forwards every 17-byte event record to an input sink.
//!
//! A newer connection on either channel always replaces the older one.

/// Application layer: the session lifecycle and the input-sink seam.
pub mod application;

/// Infrastructure layer: sockets, input sinks, frame replay, configuration.
pub mod infrastructure;
