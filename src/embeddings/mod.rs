// Embedding generation for chunk texts and questions

pub mod ollama;

use anyhow::Result;

pub use ollama::OllamaClient;

/// Turns text into dense vectors.
///
/// Implementations are blocking; async callers go through `spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Name of the model producing the vectors
    fn model(&self) -> &str;

    /// One vector per input text, in input order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
