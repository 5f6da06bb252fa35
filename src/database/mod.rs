// Storage for the vector index of event chunks

pub mod lancedb;

pub use self::lancedb::{EmbeddingRecord, SearchResult, VectorStore};
