
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use crate::content::chunker::ChunkMetadata;
use crate::{RagError, Result};

/// Vector store holding named collections of (vector, payload) points.
///
/// Each collection is a LanceDB table; dimensionality and the cosine metric
/// are fixed when the collection is created.
pub struct VectorIndex {
    connection: Connection,
}

/// Payload stored alongside each vector
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPayload {
    pub text: String,
    pub chunk_id: String,
    pub chapter: String,
    pub chapter_title: String,
    pub section: String,
    pub position: u32,
    pub keywords: Vec<String>,
}

impl ChunkPayload {
    /// Build a payload from chunk text and its metadata
    #[inline]
    pub fn from_chunk(text: String, metadata: &ChunkMetadata) -> Self {
        Self {
            text,
            chunk_id: metadata.chunk_id.clone(),
            chapter: metadata.chapter.clone(),
            chapter_title: metadata.chapter_title.clone(),
            section: metadata.section.clone(),
            position: metadata.position as u32,
            keywords: metadata.keywords.clone(),
        }
    }
}

/// A point ready for insertion into a collection
#[derive(Debug, Clone)]
pub struct IndexPoint {
    /// Storage-level id, content-addressed from the payload's `chunk_id`
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// Search result with normalized similarity score (higher is better)
#[derive(Debug, Clone)]
pub struct ScoredPayload {
    pub payload: ChunkPayload,
    pub score: f32,
}

impl VectorIndex {
    /// Open (creating if needed) the vector database at the given directory
    #[inline]
    pub async fn connect(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::VectorIndex(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self { connection })
    }

    /// Create a collection with the given vector dimensionality, if absent.
    ///
    /// Returns true when the collection was created by this call.
    #[inline]
    pub async fn create_collection(&self, name: &str, dimension: usize) -> Result<bool> {
        if self.collection_exists(name).await? {
            return Ok(false);
        }

        let schema = collection_schema(dimension);
        self.connection
            .create_empty_table(name, schema)
            .execute()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to create collection: {}", e)))?;

        info!(
            "Created collection '{}' with {} dimensions",
            name, dimension
        );
        Ok(true)
    }

    #[inline]
    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        let names = self.list_collections().await?;
        Ok(names.iter().any(|n| n == name))
    }

    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to list collections: {}", e)))
    }

    /// Number of points stored in a collection
    #[inline]
    pub async fn point_count(&self, name: &str) -> Result<u64> {
        let table = self.open_collection(name).await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Drop a collection; absent collections are not an error
    #[inline]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            debug!("Collection '{}' already absent, nothing to delete", name);
            return Ok(());
        }

        self.connection
            .drop_table(name)
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to drop collection: {}", e)))?;

        info!("Dropped collection '{}'", name);
        Ok(())
    }

    /// Insert points, replacing any existing points with the same ids.
    ///
    /// Ids are content-addressed, so re-upserting the same chunks replaces
    /// rather than duplicates them.
    #[inline]
    pub async fn upsert(&self, name: &str, points: &[IndexPoint]) -> Result<()> {
        if points.is_empty() {
            debug!("No points to upsert");
            return Ok(());
        }

        let table = self.open_collection(name).await?;

        let id_list = points
            .iter()
            .map(|p| format!("'{}'", p.id))
            .join(", ");
        table
            .delete(&format!("id IN ({})", id_list))
            .await
            .map_err(|e| {
                RagError::VectorIndex(format!("Failed to delete superseded points: {}", e))
            })?;

        let batch = build_record_batch(points)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to insert points: {}", e)))?;

        debug!("Upserted {} points into '{}'", points.len(), name);
        Ok(())
    }

    /// Cosine similarity search, ordered by descending score.
    ///
    /// Scores are normalized to [0, 1]; results below `score_threshold` are
    /// dropped, so fewer than `limit` results is a valid outcome.
    #[inline]
    pub async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        chapter_filter: Option<&str>,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPayload>> {
        debug!("Searching '{}' with limit {}", name, limit);

        let table = self.open_collection(name).await?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::VectorIndex(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(chapter) = chapter_filter {
            query = query.only_if(format!("chapter = '{}'", chapter.replace('\'', "''")));
        }

        let mut stream = query
            .execute()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        results.retain(|r| r.score >= score_threshold);

        debug!("Search returned {} results over threshold", results.len());
        Ok(results)
    }

    async fn open_collection(&self, name: &str) -> Result<lancedb::Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::VectorIndex(format!("Failed to open collection: {}", e)))
    }
}

fn collection_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("chapter", DataType::Utf8, false),
        Field::new("chapter_title", DataType::Utf8, false),
        Field::new("section", DataType::Utf8, false),
        Field::new("position", DataType::UInt32, false),
        Field::new("keywords", DataType::Utf8, false),
    ]))
}

fn build_record_batch(points: &[IndexPoint]) -> Result<RecordBatch> {
    let len = points.len();
    let dimension = points[0].vector.len();

    let mut ids = Vec::with_capacity(len);
    let mut texts = Vec::with_capacity(len);
    let mut chunk_ids = Vec::with_capacity(len);
    let mut chapters = Vec::with_capacity(len);
    let mut chapter_titles = Vec::with_capacity(len);
    let mut sections = Vec::with_capacity(len);
    let mut positions = Vec::with_capacity(len);
    let mut keywords = Vec::with_capacity(len);

    let mut flat_values = Vec::with_capacity(len * dimension);
    for point in points {
        ids.push(point.id.as_str());
        texts.push(point.payload.text.as_str());
        chunk_ids.push(point.payload.chunk_id.as_str());
        chapters.push(point.payload.chapter.as_str());
        chapter_titles.push(point.payload.chapter_title.as_str());
        sections.push(point.payload.section.as_str());
        positions.push(point.payload.position);
        keywords.push(
            serde_json::to_string(&point.payload.keywords)
                .map_err(|e| RagError::VectorIndex(format!("Failed to encode keywords: {}", e)))?,
        );
        flat_values.extend_from_slice(&point.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(item_field, dimension as i32, Arc::new(values_array), None)
            .map_err(|e| RagError::VectorIndex(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(chunk_ids)),
        Arc::new(StringArray::from(chapters)),
        Arc::new(StringArray::from(chapter_titles)),
        Arc::new(StringArray::from(sections)),
        Arc::new(UInt32Array::from(positions)),
        Arc::new(StringArray::from(keywords)),
    ];

    RecordBatch::try_new(collection_schema(dimension), arrays)
        .map_err(|e| RagError::VectorIndex(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, column: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(column)
        .ok_or_else(|| RagError::VectorIndex(format!("Missing {} column", column)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::VectorIndex(format!("Invalid {} column type", column)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredPayload>> {
    let texts = string_column(batch, "text")?;
    let chunk_ids = string_column(batch, "chunk_id")?;
    let chapters = string_column(batch, "chapter")?;
    let chapter_titles = string_column(batch, "chapter_title")?;
    let sections = string_column(batch, "section")?;
    let keywords = string_column(batch, "keywords")?;

    let positions = batch
        .column_by_name("position")
        .ok_or_else(|| RagError::VectorIndex("Missing position column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::VectorIndex("Invalid position column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        // Cosine distance in [0, 2] maps to a similarity score, higher is better
        let score = 1.0 - distance;

        results.push(ScoredPayload {
            payload: ChunkPayload {
                text: texts.value(row).to_string(),
                chunk_id: chunk_ids.value(row).to_string(),
                chapter: chapters.value(row).to_string(),
                chapter_title: chapter_titles.value(row).to_string(),
                section: sections.value(row).to_string(),
                position: positions.value(row),
                keywords: serde_json::from_str(keywords.value(row)).unwrap_or_default(),
            },
            score,
        });
    }

    Ok(results)
}
