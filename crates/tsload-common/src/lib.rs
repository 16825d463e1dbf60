//! tsload common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the tsload workspace members. Today this is the
//! logging setup used by every binary.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput, LoggingGuard};
