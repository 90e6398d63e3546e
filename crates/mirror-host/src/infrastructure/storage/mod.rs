//! Persistent storage for the host application.

pub mod config;
