//! Structured Logger
//!
//! Wraps `tracing` to provide console output, optional JSON formatting,
//! daily-rotated NDJSON files, and environment-based level control.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Options for [`init_logger`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Directory for the rolling NDJSON file. `None` logs to the console only.
    pub dir: Option<PathBuf>,
    /// Emit JSON lines on the console instead of human-readable text.
    pub json_console: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json_console: false,
        }
    }
}

/// Initialize the global structured logger.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logger(options: &LogOptions) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.level));

    let console_layer = if options.json_console {
        fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_ansi(true)
            .boxed()
    };

    // Rolling file appender: writes NDJSON to `<dir>/worldsync.log.YYYY-MM-DD`
    let file_layer = options.dir.as_ref().map(|dir| {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "worldsync.log");
        fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
