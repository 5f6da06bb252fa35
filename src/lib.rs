use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Processing error: {0}")]
    Processing(#[from] processing::ProcessingError),

    #[error("Embedding count mismatch: {chunks} chunks but {vectors} vectors, index not written")]
    CountMismatch { chunks: usize, vectors: usize },

    #[error("No events were returned by the agenda API")]
    NoEvents,

    #[error("No chunks survived cleaning and filtering")]
    NoChunks,

    #[error("The question cannot be empty")]
    EmptyQuestion,

    #[error("Service not ready: {0}")]
    NotReady(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether the error was caused by the caller's input rather than the system
    #[inline]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyQuestion)
    }
}

pub mod agenda;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod processing;
pub mod service;
