// LanceDB vector database module
// Handles vector storage and similarity search for event chunks


pub mod vector_store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::processing::ChunkMetadata;

pub use vector_store::{SearchResult, TABLE_NAME, VectorStore};

/// One chunk of an event together with its embedding, as stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this row
    pub id: String,
    pub vector: Vec<f32>,
    /// Chunk text the vector was computed from
    pub content: String,
    pub metadata: ChunkMetadata,
    /// RFC 3339 timestamp of the index build
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(content: String, metadata: ChunkMetadata, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            content,
            metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
