//! Shared utilities for bindery crates
//!
//! Kept free of dependencies on other bindery crates so every crate in the
//! workspace can use it.

pub mod logging;

pub use logging::{init_logging, parse_log_level, LogFormat, LoggingConfig, LoggingError};
