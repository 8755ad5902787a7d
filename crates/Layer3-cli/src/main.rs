//! fetchgate CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use fetchgate_foundation::GatewayConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// fetchgate - strategy-driven HTTP client with a persistent response cache
#[derive(Parser, Debug)]
#[command(name = "fetchgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./fetchgate.toml, then the global config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a request through the pipeline
    Request(commands::RequestArgs),

    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: commands::CacheAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match &args.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::discover()?,
    };
    config.validate()?;

    let gateway = commands::build_gateway(&config)?;

    let result = match args.command {
        Command::Request(request) => commands::run_request(&gateway, request).await,
        Command::Cache { action } => commands::run_cache(&gateway, action).await,
    };

    // Let background revalidations land in the cache before exiting
    tokio::select! {
        _ = gateway.settle() => {}
        _ = tokio::signal::ctrl_c() => gateway.shutdown().await,
    }

    result
}
