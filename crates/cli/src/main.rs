//! # docrag: document-grounded chat from the command line
//!
//! Runs the augmentation pipeline over a request envelope, answers it through
//! the configured chat model, or ingests a text file for later retrieval.

mod app;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the YAML configuration file (defaults to ./config.yml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Augment a request and print the resulting JSON
    Augment {
        /// Request JSON file, or `-` for stdin
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Augment a request and answer it with the chat model
    Chat {
        /// Request JSON file, or `-` for stdin
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Chunk, embed, and store a text file for one owner
    Ingest {
        /// The owner (chat id) the documents belong to
        #[arg(long)]
        owner: String,
        #[arg(long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays clean for JSON output.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = config::get_config(cli.config.as_deref())?;

    let output = match &cli.command {
        Commands::Augment { request } => app::run_augment(&config, request).await?,
        Commands::Chat { request } => app::run_chat(&config, request).await?,
        Commands::Ingest { owner, file } => app::run_ingest(&config, owner, file).await?,
    };
    println!("{output}");
    Ok(())
}
