use super::*;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tempfile::TempDir;

use crate::content::chunker::ChunkMetadata;

/// Deterministic embedder: one component per distinct word, normalized, so
/// shared vocabulary yields graded cosine similarity
struct FakeEmbedder {
    dimension: usize,
}

impl FakeEmbedder {
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.dimension] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.into_iter().map(|v| v / norm).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn metadata(chunk_id: &str, chapter: &str, section: &str, position: usize) -> ChunkMetadata {
    ChunkMetadata {
        chunk_id: chunk_id.to_string(),
        chapter: chapter.to_string(),
        chapter_title: format!("Chapter {}", chapter),
        section: section.to_string(),
        position,
        keywords: Vec::new(),
    }
}

fn test_chunks() -> Vec<(String, ChunkMetadata)> {
    vec![
        (
            "ROS 2 nodes communicate over topics using publishers and subscribers".to_string(),
            metadata("02-ros2:topics:0", "02-ros2", "Topics", 0),
        ),
        (
            "Gazebo builds digital twins for simulation before deployment".to_string(),
            metadata("03-twins:gazebo:0", "03-twins", "Gazebo", 0),
        ),
        (
            "Humanoid locomotion requires balance control and gait generation".to_string(),
            metadata("06-locomotion:balance:0", "06-locomotion", "Balance", 0),
        ),
    ]
}

async fn create_service(version: Option<String>) -> AnyResult<(TempDir, RetrievalService)> {
    let temp_dir = TempDir::new()?;
    let index = VectorIndex::connect(&temp_dir.path().join("vectors")).await?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder { dimension: 64 });
    let service = RetrievalService::new(embedder, index, "textbook".to_string(), version);
    Ok((temp_dir, service))
}

#[tokio::test]
async fn collection_name_includes_version_suffix() -> AnyResult<()> {
    let (_temp_dir, mut service) = create_service(None).await?;
    assert_eq!(service.collection_name(), "textbook");

    service.switch_version(Some("v2".to_string()));
    assert_eq!(service.collection_name(), "textbook_v2");

    service.switch_version(None);
    assert_eq!(service.collection_name(), "textbook");

    Ok(())
}

#[tokio::test]
async fn ensure_collection_is_idempotent() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;

    assert!(service.ensure_collection().await?);
    assert!(!service.ensure_collection().await?);
    assert!(service.collection_exists().await);

    Ok(())
}

#[tokio::test]
async fn existence_and_count_fail_soft() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;

    // No collection yet: health-check friendliness over errors
    assert!(!service.collection_exists().await);
    assert_eq!(service.chunk_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn upsert_is_idempotent_by_chunk_identity() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;

    let chunks = test_chunks();
    assert_eq!(service.upsert_chunks(&chunks).await?, 3);
    assert_eq!(service.chunk_count().await, 3);

    // Re-indexing without clearing must not duplicate stored vectors
    assert_eq!(service.upsert_chunks(&chunks).await?, 3);
    assert_eq!(service.chunk_count().await, 3);

    Ok(())
}

#[tokio::test]
async fn search_finds_the_matching_chunk() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;
    service.upsert_chunks(&test_chunks()).await?;

    let hits = service
        .search(
            "ROS 2 nodes communicate over topics using publishers and subscribers",
            DEFAULT_SEARCH_LIMIT,
            DEFAULT_SCORE_THRESHOLD,
            None,
        )
        .await?;

    assert!(!hits.is_empty());
    assert_eq!(hits[0].source.chunk_id, "02-ros2:topics:0");
    assert_eq!(hits[0].source.chapter, "Chapter 02-ros2");
    assert_eq!(hits[0].source.section, "Topics");
    assert!(hits[0].score > 0.99);

    Ok(())
}

#[tokio::test]
async fn threshold_is_monotonic() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;
    service.upsert_chunks(&test_chunks()).await?;

    let query = "how do ROS 2 publishers and subscribers use topics";
    let strict = service.search(query, 5, 0.5, None).await?;
    let loose = service.search(query, 5, 0.3, None).await?;

    let strict_ids: Vec<&str> = strict.iter().map(|h| h.source.chunk_id.as_str()).collect();
    let loose_ids: Vec<&str> = loose.iter().map(|h| h.source.chunk_id.as_str()).collect();

    for id in &strict_ids {
        assert!(loose_ids.contains(id), "strict result {} missing from loose set", id);
    }

    Ok(())
}

#[tokio::test]
async fn chapter_filter_limits_results() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;
    service.upsert_chunks(&test_chunks()).await?;

    let hits = service
        .search("simulation topics balance", 5, 0.0, Some("03-twins"))
        .await?;

    assert!(!hits.is_empty());
    for hit in &hits {
        assert!(hit.source.chunk_id.starts_with("03-twins"));
    }

    Ok(())
}

#[tokio::test]
async fn selected_text_search_composes_the_query() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;
    service.upsert_chunks(&test_chunks()).await?;

    let hits = service
        .search_with_selected_text(
            "what does this mean",
            "Gazebo builds digital twins for simulation before deployment",
            5,
            0.1,
        )
        .await?;

    assert!(!hits.is_empty());
    assert_eq!(hits[0].source.chunk_id, "03-twins:gazebo:0");

    Ok(())
}

#[tokio::test]
async fn clear_collection_recreates_empty() -> AnyResult<()> {
    let (_temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;
    service.upsert_chunks(&test_chunks()).await?;
    assert_eq!(service.chunk_count().await, 3);

    assert!(service.clear_collection().await?);
    assert!(service.collection_exists().await);
    assert_eq!(service.chunk_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn version_listing_maps_bare_base_to_default() -> AnyResult<()> {
    let (temp_dir, service) = create_service(None).await?;
    service.ensure_collection().await?;

    // A second service targets a versioned collection in the same store
    let index = VectorIndex::connect(&temp_dir.path().join("vectors")).await?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder { dimension: 64 });
    let versioned = RetrievalService::new(
        embedder,
        index,
        "textbook".to_string(),
        Some("v2".to_string()),
    );
    versioned.ensure_collection().await?;

    assert_eq!(
        service.list_collection_versions().await,
        vec!["default".to_string(), "v2".to_string()]
    );

    Ok(())
}

#[test]
fn dedup_preserves_first_seen_order() {
    let hit = |chunk_id: &str, score: f32| SearchHit {
        text: "text".to_string(),
        source: SourceReference {
            chunk_id: chunk_id.to_string(),
            chapter: "Chapter".to_string(),
            section: "Section".to_string(),
            score,
        },
        score,
    };

    let sources = dedup_sources(vec![
        hit("a", 0.9),
        hit("b", 0.8),
        hit("a", 0.7),
        hit("c", 0.6),
    ]);

    let ids: Vec<&str> = sources.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!((sources[0].score - 0.9).abs() < f32::EPSILON);
}
