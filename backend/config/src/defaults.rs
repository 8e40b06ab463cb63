//! Config defaults: applies default values to parsed config.

use crate::schema::{LoggingConfig, ServerConfig, WorldSyncConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 5000;

/// Directory served under `/static`, relative to the working directory.
pub const DEFAULT_STATIC_DIR: &str = "static";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: WorldSyncConfig) -> WorldSyncConfig {
    let config = apply_server_defaults(config);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: WorldSyncConfig) -> WorldSyncConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.host.get_or_insert_with(|| DEFAULT_HOST.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    server
        .static_dir
        .get_or_insert_with(|| DEFAULT_STATIC_DIR.to_string());
    config
}

fn apply_logging_defaults(mut config: WorldSyncConfig) -> WorldSyncConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json_console.get_or_insert(false);
    config
}
