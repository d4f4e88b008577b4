use std::path::PathBuf;

use clap::{Parser, Subcommand};
use textbook_rag::Result;
use textbook_rag::commands::{index_content, init_config, serve, show_config, show_status};
use textbook_rag::config::{Config, get_config_dir};

#[derive(Parser)]
#[command(name = "textbook-rag")]
#[command(about = "Retrieval-augmented Q&A backend for a textbook")]
#[command(version)]
struct Cli {
    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve,
    /// Index textbook content into the vector collection
    Index {
        /// Clear the existing collection before indexing
        #[arg(long)]
        clear: bool,
        /// Path to the content directory (default: from configuration)
        #[arg(long)]
        content_path: Option<PathBuf>,
        /// Maximum tokens per chunk (default: from configuration)
        #[arg(long)]
        max_chunk_tokens: Option<usize>,
        /// Target a versioned collection, e.g. "v2"
        #[arg(long)]
        collection_version: Option<String>,
    },
    /// Show collection status
    Status,
    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(anyhow::Error::from)?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Serve => {
            serve(config).await?;
        }
        Commands::Index {
            clear,
            content_path,
            max_chunk_tokens,
            collection_version,
        } => {
            index_content(config, clear, content_path, max_chunk_tokens, collection_version)
                .await?;
        }
        Commands::Status => {
            show_status(config).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config)?;
            }
        }
    }

    Ok(())
}
