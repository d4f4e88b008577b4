#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::Result;
use crate::content::chunker::ChunkMetadata;
use crate::database::lancedb::{ChunkPayload, IndexPoint, VectorIndex};
use crate::embeddings::EmbeddingProvider;

/// Default result cap for chat-path searches
pub const DEFAULT_SEARCH_LIMIT: usize = 5;
/// Default minimum similarity for chat-path searches
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

// Vector store write batches, matching the embedding provider's batch limit
const UPSERT_BATCH_SIZE: usize = 100;

// Selected-text context is capped before being embedded
const SELECTION_CONTEXT_CHARS: usize = 500;

/// A citation surfaced to the end user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReference {
    pub chunk_id: String,
    pub chapter: String,
    pub section: String,
    pub score: f32,
}

/// One retrieval result: chunk text plus its citation
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub source: SourceReference,
    pub score: f32,
}

/// Query-time search interface consumed by the grounding policy and the
/// agent's search tool
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        chapter_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>>;
}

/// Orchestrates the embedding provider and vector index; owns collection
/// lifecycle and version switching
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    base_collection: String,
    version: Option<String>,
}

impl RetrievalService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: VectorIndex,
        base_collection: String,
        version: Option<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            base_collection,
            version,
        }
    }

    /// Active collection name, `{base}` or `{base}_{version}`
    #[inline]
    pub fn collection_name(&self) -> String {
        self.version.as_ref().map_or_else(
            || self.base_collection.clone(),
            |version| format!("{}_{}", self.base_collection, version),
        )
    }

    /// Retarget the service at a different collection version
    #[inline]
    pub fn switch_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    /// Enumerate existing versions of the base collection.
    ///
    /// The bare base collection maps to the label "default". Fails soft to
    /// an empty list when the index is unreachable.
    #[inline]
    pub async fn list_collection_versions(&self) -> Vec<String> {
        let Ok(names) = self.index.list_collections().await else {
            return Vec::new();
        };

        let mut versions: Vec<String> = names
            .into_iter()
            .filter(|name| name.starts_with(&self.base_collection))
            .map(|name| {
                if name == self.base_collection {
                    "default".to_string()
                } else {
                    name.chars()
                        .skip(self.base_collection.chars().count() + 1)
                        .collect()
                }
            })
            .collect();
        versions.sort();
        versions
    }

    /// Check that the vector index is reachable
    #[inline]
    pub async fn ping(&self) -> Result<()> {
        self.index.list_collections().await.map(|_| ())
    }

    /// Create the active collection if absent; returns whether it was created
    #[inline]
    pub async fn ensure_collection(&self) -> Result<bool> {
        self.index
            .create_collection(&self.collection_name(), self.embedder.dimension())
            .await
    }

    /// Whether the active collection exists; fails soft to false
    #[inline]
    pub async fn collection_exists(&self) -> bool {
        match self.index.collection_exists(&self.collection_name()).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Collection existence check failed: {}", e);
                false
            }
        }
    }

    /// Number of chunks in the active collection; fails soft to zero
    #[inline]
    pub async fn chunk_count(&self) -> u64 {
        match self.index.point_count(&self.collection_name()).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Chunk count check failed: {}", e);
                0
            }
        }
    }

    /// Embed and upsert chunks into the active collection.
    ///
    /// Point ids are derived from each chunk's `chunk_id`, so re-indexing
    /// unchanged content replaces points instead of duplicating them.
    #[inline]
    pub async fn upsert_chunks(&self, chunks: &[(String, ChunkMetadata)]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|(text, _)| text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let points: Vec<IndexPoint> = chunks
            .iter()
            .zip(embeddings)
            .map(|((text, metadata), vector)| IndexPoint {
                id: point_id(&metadata.chunk_id),
                vector,
                payload: ChunkPayload::from_chunk(text.clone(), metadata),
            })
            .collect();

        let collection = self.collection_name();
        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            self.index.upsert(&collection, batch).await?;
        }

        info!("Upserted {} chunks into '{}'", points.len(), collection);
        Ok(points.len())
    }

    /// Delete and recreate the active collection
    #[inline]
    pub async fn clear_collection(&self) -> Result<bool> {
        self.index.delete_collection(&self.collection_name()).await?;
        self.ensure_collection().await?;
        Ok(true)
    }

    /// Search scoped by user-selected passage text.
    ///
    /// The embedded query is a composite of a context block built from the
    /// selection's leading characters plus the original question.
    #[inline]
    pub async fn search_with_selected_text(
        &self,
        query: &str,
        selected_text: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let context: String = selected_text.chars().take(SELECTION_CONTEXT_CHARS).collect();
        let combined = format!("Context: {}\n\nQuestion: {}", context, query);
        self.search(&combined, limit, score_threshold, None).await
    }
}

#[async_trait]
impl Retriever for RetrievalService {
    #[inline]
    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        chapter_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query).await?;

        let results = self
            .index
            .search(
                &self.collection_name(),
                &query_vector,
                chapter_filter,
                limit,
                score_threshold,
            )
            .await?;

        debug!("Search for '{}' returned {} hits", query, results.len());

        Ok(results
            .into_iter()
            .map(|scored| {
                let payload = scored.payload;
                let chapter = if payload.chapter_title.is_empty() {
                    payload.chapter
                } else {
                    payload.chapter_title
                };
                SearchHit {
                    text: payload.text,
                    source: SourceReference {
                        chunk_id: payload.chunk_id,
                        chapter,
                        section: payload.section,
                        score: scored.score,
                    },
                    score: scored.score,
                }
            })
            .collect())
    }
}

/// Deduplicate hits into citations by chunk id, preserving first-seen order
#[inline]
pub fn dedup_sources(hits: Vec<SearchHit>) -> Vec<SourceReference> {
    hits.into_iter()
        .map(|hit| hit.source)
        .unique_by(|source| source.chunk_id.clone())
        .collect()
}

// Content-addressed storage id for a chunk
fn point_id(chunk_id: &str) -> String {
    let digest = Sha256::digest(chunk_id.as_bytes());
    hex::encode(digest)
}
