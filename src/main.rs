use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metronome::config::Config;
use metronome::server::SchedulerServer;

#[derive(Parser)]
#[command(
    name = "metronome",
    version,
    about = "Interval action scheduler firing HTTP callouts for an edge platform",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler service
    Serve {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the bind address from the config
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Parse and validate a configuration file, then print it
    CheckConfig {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Serve { config, bind } => {
            tracing::info!(config = ?config, "starting metronome scheduler");
            serve(config, bind).await?;
        }

        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("metronome=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("metronome=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_env()?,
    };
    if let Some(bind) = bind {
        config.service.bind_address = bind;
        config.validate()?;
    }

    let server = SchedulerServer::new(config)?;

    server
        .start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = Config::from_file(&path)?;

    println!("Configuration OK: {}", path.display());
    println!("  Bind address:  {}", config.service.bind_address);
    println!("  Tick interval: {}ms", config.service.tick_interval_millis);
    println!("  Timeout:       {}ms", config.service.timeout_millis);
    println!("  Metadata:      {}", config.clients.metadata.url());
    println!("  Schedules:     {}", config.schedules.len());
    println!("  Events:        {}", config.schedule_events.len());

    Ok(())
}
