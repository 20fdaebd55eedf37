//! # tether utilities
//!
//! Shared utilities, logging, and configuration helpers for tether.
//!
//! Logging is built on `tracing`; configuration is read from `TETHER_*`
//! environment variables.

pub mod config;
pub mod logging;

pub use config::{env_or, parse_value, ConfigError};
pub use logging::{init_logging, init_logging_to_dir, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
