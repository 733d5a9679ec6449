//! Logging utilities.
//!
//! Every diagnostic the lessons emit (context errors, shader logs, capture
//! results) goes through the `log` facade; this module installs `env_logger`
//! as the backend.

mod init;

pub use init::{init_logging, LoggingConfig};
