//! Hookrelay CLI - create, watch and search capture endpoints
//!
//! Usage:
//!   hookrelay new                   Create a new endpoint
//!   hookrelay watch <ENDPOINT>      Stream captured requests live
//!   hookrelay history <ENDPOINT>    Show stored requests, newest first
//!   hookrelay stats                 Show server counters

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hookrelay")]
#[command(author = "Hookrelay Team")]
#[command(version)]
#[command(about = "Capture and inspect HTTP requests sent to disposable endpoints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Hookrelay server base URL
    #[arg(long, global = true, env = "HOOKRELAY_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new endpoint
    New,

    /// Stream requests captured for an endpoint as they arrive
    Watch {
        /// Endpoint name
        endpoint: String,

        /// Print each request as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Show stored requests for an endpoint
    History {
        /// Endpoint name
        endpoint: String,

        /// Only requests whose body or headers contain this text
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of requests to show
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show request, viewer and endpoint counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},hookrelay_cli=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let server = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::New => {
            commands::new::run(&server).await?;
        }

        Commands::Watch { endpoint, json } => {
            commands::watch::run(&server, &endpoint, json).await?;
        }

        Commands::History { endpoint, search, limit } => {
            commands::history::run(&server, &endpoint, search.as_deref(), limit).await?;
        }

        Commands::Stats => {
            commands::stats::run(&server).await?;
        }
    }

    Ok(())
}
