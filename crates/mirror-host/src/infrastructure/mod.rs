//! Infrastructure layer for the host application.
//!
//! Contains OS-facing adapters: network sockets, input sinks, the frame
//! replay source, and file-system configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `mirror_core`, but MUST NOT be imported by the domain layer.

pub mod frame_replay;
pub mod input_injection;
pub mod network;
pub mod storage;
