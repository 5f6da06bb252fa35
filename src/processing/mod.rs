// Document preparation: normalization, cleaning, deduplication and chunking
// of raw agenda events before they are embedded.

pub mod chunking;
pub mod cleaner;
pub mod dedup;
pub mod normalizer;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chunking::{ChunkMetadata, SOURCE_TAG, TextSplitter, chunk_records};
pub use cleaner::{CleanedRecord, RawRecord, clean_records};
pub use dedup::{FilteredRecord, filter_and_dedup, fingerprint};
pub use normalizer::normalize;

/// Invalid parameters handed to the filter or the chunker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}

/// Parameters of the preparation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Minimum number of characters of semantic text for a record to be kept
    pub min_chars: usize,
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same record
    pub chunk_overlap: usize,
}

impl Default for ProcessingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_chars: 200,
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ProcessingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ProcessingError> {
        validate_chunk_params(self.chunk_size, self.chunk_overlap)
    }
}

pub(crate) fn validate_chunk_params(
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<(), ProcessingError> {
    if chunk_size == 0 {
        return Err(ProcessingError::InvalidChunkSize(chunk_size));
    }
    if chunk_overlap >= chunk_size {
        return Err(ProcessingError::OverlapTooLarge {
            overlap: chunk_overlap,
            chunk_size,
        });
    }
    Ok(())
}
