//! Application layer for the host.
//!
//! - **`inject_input`** – the [`inject_input::InputSink`] trait the control
//!   channel hands decoded events to.  Implementations live in
//!   `infrastructure::input_injection`.
//! - **`session`** – [`session::SessionController`], which owns the
//!   running/stopped lifecycle and the three channel loops.

pub mod inject_input;
pub mod session;
