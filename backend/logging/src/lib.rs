//! Telemetry and structured logging components for worldsync.
//!
//! Handles console/NDJSON log output and the store mutation logger.

pub mod event_logger;
pub mod logger;

pub use event_logger::{MutationLogger, WorldEvent};
pub use logger::{init_logger, LogOptions};
