//! Curator CLI, the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP gateway (`POST /chat`, `GET /health`)
//! - `index`    Build the corpus index and list what it holds
//! - `ask`      Run one question through the full pipeline
//! - `tools`    List the tools offered by the configured tool provider
//! - `config`   Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "curator",
    about = "Curator: retrieval-augmented curation agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.curator/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build the document index and print its contents
    Index,

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Community the question is scoped to
        #[arg(long)]
        community: Option<String>,
    },

    /// List tools from the configured tool provider
    Tools,

    /// Print the effective configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Index => commands::index::run(config).await?,
        Commands::Ask {
            question,
            community,
        } => commands::ask::run(config, question, community).await?,
        Commands::Tools => commands::tools::run(config).await?,
        Commands::Config => commands::config_cmd::run(&config, cli.config.as_deref()),
    }

    Ok(())
}
