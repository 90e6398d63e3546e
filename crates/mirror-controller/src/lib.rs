//! mirror-controller library entry point.
//!
//! The *controller* is the device that views a host's screen and drives its
//! input.  Talking to a host takes three independent connections:
//!
//! 1. [`discovery::discover_host`] broadcasts UDP probes until a host answers.
//! 2. [`video::VideoReceiver`] opens the video channel, parses the
//!    descriptor line, and yields frames.
//! 3. [`control::PendingPairing`] opens the control channel and receives the
//!    PIN challenge; pairing turns it into a [`control::ControlSender`].

pub mod control;
pub mod discovery;
pub mod error;
pub mod video;

pub use error::ControllerError;
