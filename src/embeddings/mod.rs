// Embeddings module
// Maps text to fixed-dimension vectors via the configured provider

pub mod openai;

use async_trait::async_trait;

use crate::Result;

/// Text-to-vector provider with a fixed output dimensionality
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output dimensionality of every vector this provider produces
    fn dimension(&self) -> usize;
}

pub use openai::OpenAiEmbeddings;
