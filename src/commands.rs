use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::agent::{AgentRuntime, ChatAgent, OpenAiAgentRuntime};
use crate::config::Config;
use crate::database::lancedb::VectorIndex;
use crate::database::sqlite::SessionDatabase;
use crate::embeddings::{EmbeddingProvider, OpenAiEmbeddings};
use crate::grounding::{GroundingPolicy, HeuristicGrounding};
use crate::indexer::process_content;
use crate::retrieval::{RetrievalService, Retriever};
use crate::server::{self, AppState};
use crate::session::SessionRegistry;

async fn build_retrieval(config: &Config, version: Option<String>) -> Result<RetrievalService> {
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(OpenAiEmbeddings::new(config).context("Failed to initialize embedding client")?);

    let index = VectorIndex::connect(&config.vector_database_path())
        .await
        .context("Failed to initialize vector index")?;

    Ok(RetrievalService::new(
        embedder,
        index,
        config.vector.collection_name.clone(),
        version,
    ))
}

/// Start the HTTP server
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    std::fs::create_dir_all(config.get_base_dir()).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.get_base_dir().display()
        )
    })?;

    let retrieval = Arc::new(build_retrieval(&config, None).await?);

    // Startup is fail-soft: an unreachable vector index degrades the health
    // check instead of preventing the server from binding
    match retrieval.ensure_collection().await {
        Ok(_) => info!(
            "Vector collection ready: {} chunks",
            retrieval.chunk_count().await
        ),
        Err(e) => warn!("Could not reach vector index at startup: {}", e),
    }

    let searcher: Arc<dyn Retriever> = Arc::clone(&retrieval) as Arc<dyn Retriever>;
    let grounding: Arc<dyn GroundingPolicy> =
        Arc::new(HeuristicGrounding::new(Arc::clone(&searcher)));
    let runtime: Arc<dyn AgentRuntime> = Arc::new(
        OpenAiAgentRuntime::new(&config, searcher).context("Failed to initialize agent runtime")?,
    );

    let session_db = SessionDatabase::new(config.session_database_path())
        .await
        .context("Failed to initialize session database")?;
    let sessions = SessionRegistry::new(session_db, config.session.cache_capacity);

    let chat = Arc::new(ChatAgent::new(runtime, grounding, sessions));

    let state = Arc::new(AppState { retrieval, chat });
    let app = server::router(state, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}

/// Index the content directory into the vector collection
#[inline]
pub async fn index_content(
    config: Config,
    clear: bool,
    content_path: Option<PathBuf>,
    max_chunk_tokens: Option<usize>,
    collection_version: Option<String>,
) -> Result<()> {
    std::fs::create_dir_all(config.get_base_dir()).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.get_base_dir().display()
        )
    })?;

    let retrieval = build_retrieval(&config, collection_version).await?;

    let content_path = content_path.unwrap_or_else(|| config.content.path.clone());
    println!("Content path: {}", content_path.display());

    if clear {
        println!("Clearing existing collection...");
        retrieval
            .clear_collection()
            .await
            .context("Failed to clear collection")?;
        println!("Collection cleared.");
    } else {
        retrieval
            .ensure_collection()
            .await
            .context("Failed to ensure collection")?;
    }

    let max_tokens = max_chunk_tokens.unwrap_or(config.chunking.max_tokens);
    let report = process_content(&content_path, max_tokens)?;

    println!();
    println!("Processed {} files:", report.files_processed.len());
    for file in &report.files_processed {
        println!("  - {}", file);
    }

    if !report.errors.is_empty() {
        println!();
        println!("{} files failed:", report.errors.len());
        for error in &report.errors {
            println!("  ! {}", error);
        }
    }

    println!();
    println!("Generated {} chunks", report.chunks.len());

    if report.chunks.is_empty() {
        println!("No chunks to index.");
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").context("valid progress template")?,
    );
    spinner.set_message(format!(
        "Embedding and indexing {} chunks into '{}'...",
        report.chunks.len(),
        retrieval.collection_name()
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let count = retrieval
        .upsert_chunks(&report.chunks)
        .await
        .context("Failed to index chunks")?;

    spinner.finish_and_clear();
    println!("Successfully indexed {} chunks", count);
    println!(
        "Total chunks in collection: {}",
        retrieval.chunk_count().await
    );

    Ok(())
}

/// Show collection status without requiring provider credentials
#[inline]
pub async fn show_status(config: Config) -> Result<()> {
    println!("Active collection: {}", config.vector.collection_name);

    let index = match VectorIndex::connect(&config.vector_database_path()).await {
        Ok(index) => index,
        Err(e) => {
            println!("Vector index: unreachable ({})", e);
            return Ok(());
        }
    };

    let collections = match index.list_collections().await {
        Ok(names) => names,
        Err(e) => {
            println!("Vector index: unreachable ({})", e);
            return Ok(());
        }
    };

    if collections.is_empty() {
        println!("No collections exist yet. Run 'textbook-rag index' first.");
        return Ok(());
    }

    println!("Collections:");
    for name in &collections {
        let count = index.point_count(name).await.unwrap_or(0);
        let marker = if *name == config.vector.collection_name {
            " (active)"
        } else {
            ""
        };
        println!("  {} - {} chunks{}", name, count, marker);
    }

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    let rendered =
        toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", rendered);
    Ok(())
}

/// Write the current configuration to the config directory
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save().context("Failed to save configuration")?;
    println!(
        "Wrote configuration to {}",
        config.get_base_dir().join("config.toml").display()
    );
    Ok(())
}
