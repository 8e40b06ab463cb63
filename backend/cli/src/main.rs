mod api;
mod status_cmd;
mod world_cmd;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use worldsync_config::{ServerConfig, WorldSyncConfig};
use worldsync_gateway::{GatewayState, start_server};
use worldsync_logging::{LogOptions, MutationLogger, init_logger};

#[derive(Parser)]
#[command(name = "worldsync")]
#[command(about = "worldsync: real-time shared world state over WebSockets")]
#[command(version)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the worldsync server
    Serve {
        /// Address to bind the HTTP server to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory served under /static
        #[arg(long)]
        static_dir: Option<String>,
    },
    /// Show the health of a running server
    Status {
        #[arg(long, default_value = api::DEFAULT_URL)]
        url: String,
    },
    /// Print the world, or one entity, from a running server
    World {
        #[arg(long, default_value = api::DEFAULT_URL)]
        url: String,
        /// Only print this entity
        entity: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| worldsync_config::config_file_path(&worldsync_config::config_dir()));
    let (mut config, load_error) = load_for_command(&cli.command, &config_path).await?;

    if let Commands::Serve {
        host,
        port,
        static_dir,
    } = &cli.command
    {
        apply_cli_overrides(&mut config, host.clone(), *port, static_dir.clone());
    }

    init_logger(&LogOptions {
        level: config.log_level().to_string(),
        dir: config.log_dir().map(PathBuf::from),
        json_console: config.json_console(),
    });
    if let Some(e) = load_error {
        let detail = format!("{e:#}");
        warn!(path = %config_path.display(), error = %detail, "Ignoring unusable config file");
    }
    if cli.command.runs_server() {
        worldsync_config::check(&config)?;
    }

    match cli.command {
        Commands::Serve { .. } => run_server(config).await?,
        Commands::Status { url } => status_cmd::run(&url).await?,
        Commands::World { url, entity } => world_cmd::run(&url, entity.as_deref()).await?,
    }

    Ok(())
}

impl Commands {
    /// Only `serve` depends on the config; the client commands take a URL.
    fn runs_server(&self) -> bool {
        matches!(self, Commands::Serve { .. })
    }
}

/// Load the config for `command`.
///
/// A config that fails to load is fatal for `serve`. Client commands fall
/// back to defaults and hand the error back so it can be logged.
async fn load_for_command(
    command: &Commands,
    path: &Path,
) -> Result<(WorldSyncConfig, Option<anyhow::Error>)> {
    match worldsync_config::load_and_prepare(path).await {
        Ok(config) => Ok((config, None)),
        Err(e) if !command.runs_server() => Ok((
            worldsync_config::apply_all_defaults(WorldSyncConfig::default()),
            Some(e),
        )),
        Err(e) => Err(e),
    }
}

fn apply_cli_overrides(
    config: &mut WorldSyncConfig,
    host: Option<String>,
    port: Option<u16>,
    static_dir: Option<String>,
) {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    if let Some(host) = host {
        server.host = Some(host);
    }
    if let Some(port) = port {
        server.port = Some(port);
    }
    if let Some(dir) = static_dir {
        server.static_dir = Some(dir);
    }
}

async fn run_server(config: WorldSyncConfig) -> Result<()> {
    info!(
        bind = %config.bind_address(),
        static_dir = %config.static_dir(),
        "Starting worldsync"
    );

    let state = GatewayState::new();
    state.store.add_observer(Arc::new(MutationLogger::new())).await;

    start_server(&config.bind_address(), state, Path::new(config.static_dir())).await
}
