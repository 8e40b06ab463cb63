//! Config validation with user-friendly error messages.

use crate::schema::WorldSyncConfig;
use std::path::Path;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &WorldSyncConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_server(config: &WorldSyncConfig, report: &mut ValidationReport) {
    if config.host().trim().is_empty() {
        report.error("server.host", "Host cannot be empty");
    }

    let port = config.port();
    if port == 0 {
        report.error("server.port", "Port must be between 1 and 65535");
    } else if port < 1024 && port != 80 && port != 443 {
        report.warn(
            "server.port",
            format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
        );
    }

    let static_dir = config.static_dir();
    if !Path::new(static_dir).is_dir() {
        report.warn(
            "server.staticDir",
            format!("Static directory '{static_dir}' does not exist; /static will return 404"),
        );
    }
}

/// Plain level names are checked; full `EnvFilter` directives pass through.
fn validate_logging(config: &WorldSyncConfig, report: &mut ValidationReport) {
    let level = config.log_level();
    let is_directive = level.contains('=') || level.contains(',');
    if !is_directive && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of: {}", LOG_LEVELS.join(", ")),
        );
    }
}
