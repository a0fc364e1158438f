//! finchat CLI
//!
//! Chat with your PDFs.
//!
//! Commands:
//!   chat   - Interactive session (optionally preloading PDFs)
//!   ask    - One-shot question over the given PDFs
//!   login  - Validate and save a Hugging Face token
//!   serve  - Start HTTP server
//!   info   - Show configuration, models and index status
//!   init   - Write the default configuration file

mod commands;
mod server;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use finchat::{Config, StoreConfig};

#[derive(Parser)]
#[command(name = "finchat")]
#[command(about = "Chat with your PDFs using local embeddings and Llama")]
#[command(version)]
struct Cli {
    /// Hugging Face token (falls back to HF_TOKEN, then the cached login)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Keep the index in memory instead of the persistent store
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// PDF files or directories to process before the first question
        paths: Vec<PathBuf>,
    },

    /// Ask a single question about some PDFs (indexed in memory, the saved index is untouched)
    Ask {
        /// PDF files or directories
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// The question
        question: String,
    },

    /// Validate a Hugging Face token and save it
    Login {
        /// Access token (hf_...)
        token: String,

        /// Only validate, do not write the token to the Hugging Face cache
        #[arg(long)]
        no_save: bool,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8005")]
        port: u16,
    },

    /// Show configuration, models and index status
    Info,

    /// Write the default configuration to ~/.finchat/config.toml
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("finchat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load_or_default()?;
    if cli.memory {
        config.store = StoreConfig::memory();
    }
    let token = finchat::resolve_token(cli.token.as_deref());

    match cli.command {
        None => {
            commands::run_info(&config).await?;
            println!("\nRun 'finchat --help' to get started.");
        }

        Some(Commands::Chat { paths }) => {
            commands::run_chat(&config, token, &paths).await?;
        }

        Some(Commands::Ask { files, question }) => {
            commands::run_ask(&config, token.as_deref(), &files, &question).await?;
        }

        Some(Commands::Login { token, no_save }) => {
            commands::run_login(&config, &token, !no_save).await?;
        }

        Some(Commands::Serve { port }) => {
            println!("Starting server on http://localhost:{}...", port);
            server::run_server(config, token, port).await?;
        }

        Some(Commands::Info) => {
            commands::run_info(&config).await?;
        }

        Some(Commands::Init { force }) => {
            commands::run_init(force)?;
        }
    }

    Ok(())
}
