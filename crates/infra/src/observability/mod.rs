//! Observability setup
//!
//! The session core logs through `tracing` macros only; this module
//! installs the subscriber that renders them.

pub mod logging;

pub use logging::{init_logging, try_init_logging, LoggingError};
