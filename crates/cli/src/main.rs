mod config_commands;
mod echo;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    chirp_channels::Pipeline,
    chirp_config::ChirpConfig,
    chirp_twitter::{TwitterBridge, relay_router},
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{
    config_commands::ConfigAction,
    echo::{EchoBot, LogTurnError, TurnLogger},
};

#[derive(Parser)]
#[command(name = "chirp", about = "chirp: Twitter mention bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./chirp.toml and ~/.config/chirp/).
    #[arg(long, global = true, env = "CHIRP_CONFIG")]
    config: Option<PathBuf>,

    /// Relay endpoint bind address (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Relay endpoint port (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream mentions and reply to them (default when no subcommand is provided).
    Run,
    /// Serve the relay endpoint that runs turns for relayed mentions.
    Serve,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

async fn connect_bridge(config: &ChirpConfig) -> anyhow::Result<Arc<TwitterBridge>> {
    let twitter = config_commands::twitter_config(config)?;

    let pipeline = Pipeline::new()
        .with_middleware(Arc::new(TurnLogger))
        .with_error_handler(Arc::new(LogTurnError));
    let bridge = chirp_twitter::connect(&twitter, Arc::new(EchoBot))
        .await
        .context("failed to connect twitter bot")?
        .with_pipeline(pipeline);
    Ok(Arc::new(bridge))
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config_commands::load(cli.config.as_deref())?;
    let bridge = connect_bridge(&config).await?;
    bridge.start();

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    bridge.stop();
    Ok(())
}

async fn serve(cli: &Cli) -> anyhow::Result<()> {
    let config = config_commands::load(cli.config.as_deref())?;
    let bind = cli
        .bind
        .clone()
        .unwrap_or_else(|| config.server.bind.clone());
    let port = cli.port.unwrap_or(config.server.port);

    let bridge = connect_bridge(&config).await?;
    let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(addr = %listener.local_addr()?, "relay endpoint listening");

    axum::serve(listener, relay_router(bridge))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chirp starting");

    match &cli.command {
        None | Some(Commands::Run) => run(&cli).await,
        Some(Commands::Serve) => serve(&cli).await,
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action.clone(), cli.config.as_deref())
        },
    }
}
