// Indexer module
// Runs the preparation pipeline and rebuilds the vector index from the agenda API


use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::agenda::AgendaClient;
use crate::config::Config;
use crate::database::{EmbeddingRecord, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::processing::{
    ChunkMetadata, ProcessingConfig, ProcessingError, RawRecord, chunk_records, clean_records,
    filter_and_dedup,
};
use crate::{RagError, Result};

/// Chunks ready for embedding, with the record counts seen at each stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedChunks {
    /// Chunk texts, index-aligned with `metadatas`
    pub texts: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub raw_count: usize,
    pub cleaned_count: usize,
    pub filtered_count: usize,
}

impl PreparedChunks {
    #[inline]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Statistics about one index rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub events_fetched: usize,
    pub records_cleaned: usize,
    pub records_kept: usize,
    pub chunks_created: usize,
    pub embeddings_stored: usize,
    pub duration: Duration,
}

/// Clean, filter and chunk a batch of raw records.
///
/// Parameters are validated before anything else. Returns `None` for an empty batch;
/// otherwise the chunks, which may be empty when no record survived.
#[inline]
pub fn prepare_chunks(
    records: &[RawRecord],
    config: &ProcessingConfig,
) -> std::result::Result<Option<PreparedChunks>, ProcessingError> {
    config.validate()?;

    if records.is_empty() {
        info!("No records to prepare");
        return Ok(None);
    }

    let cleaned = clean_records(records);
    let cleaned_count = cleaned.len();

    let filtered = filter_and_dedup(cleaned, config.min_chars);
    let filtered_count = filtered.len();

    let (texts, metadatas) = chunk_records(&filtered, config.chunk_size, config.chunk_overlap)?;

    info!(
        "Prepared {} chunks from {} records ({} cleaned, {} kept)",
        texts.len(),
        records.len(),
        cleaned_count,
        filtered_count
    );

    Ok(Some(PreparedChunks {
        texts,
        metadatas,
        raw_count: records.len(),
        cleaned_count,
        filtered_count,
    }))
}

/// Rebuilds the whole vector index: fetch, prepare, embed, verify, store
#[derive(Clone)]
pub struct Indexer {
    agenda: AgendaClient,
    embedder: Arc<dyn EmbeddingProvider>,
    processing: ProcessingConfig,
    vector_db_path: PathBuf,
}

impl Indexer {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.processing.validate()?;

        Ok(Self {
            agenda: AgendaClient::new(&config.agenda)?,
            embedder,
            processing: config.processing.clone(),
            vector_db_path: config.vector_database_path(),
        })
    }

    /// Replace the agenda client, e.g. to tune its retry policy
    #[inline]
    pub fn with_agenda_client(mut self, agenda: AgendaClient) -> Self {
        self.agenda = agenda;
        self
    }

    /// Fetch a region's events and prepare their chunks without embedding them
    #[inline]
    pub async fn prepare(&self, region: &str) -> Result<PreparedChunks> {
        let events = self.agenda.fetch_events(region).await;
        if events.is_empty() {
            warn!("No events fetched for region {}", region);
            return Err(RagError::NoEvents);
        }

        prepare_chunks(&events, &self.processing)?.ok_or(RagError::NoEvents)
    }

    /// Rebuild the index for a region.
    ///
    /// The existing index is left untouched unless every chunk received a vector.
    #[inline]
    pub async fn rebuild(&self, region: &str) -> Result<IndexingStats> {
        let start = Instant::now();
        info!("Rebuilding index for region {}", region);

        let prepared = self.prepare(region).await?;
        if prepared.is_empty() {
            warn!("No chunks survived cleaning and filtering");
            return Err(RagError::NoChunks);
        }

        let PreparedChunks {
            texts,
            metadatas,
            raw_count,
            cleaned_count,
            filtered_count,
        } = prepared;

        info!(
            "Embedding {} chunks with model {}",
            texts.len(),
            self.embedder.model()
        );
        let (texts, vectors) = self.embed(texts).await?;

        if vectors.len() != texts.len() {
            error!(
                "Embedding count mismatch: {} chunks but {} vectors, index not written",
                texts.len(),
                vectors.len()
            );
            return Err(RagError::CountMismatch {
                chunks: texts.len(),
                vectors: vectors.len(),
            });
        }

        let records: Vec<EmbeddingRecord> = texts
            .into_iter()
            .zip(metadatas)
            .zip(vectors)
            .map(|((content, metadata), vector)| EmbeddingRecord::new(content, metadata, vector))
            .collect();

        let store = VectorStore::open(&self.vector_db_path).await?;
        store.replace_all(&records).await?;

        let stats = IndexingStats {
            events_fetched: raw_count,
            records_cleaned: cleaned_count,
            records_kept: filtered_count,
            chunks_created: records.len(),
            embeddings_stored: records.len(),
            duration: start.elapsed(),
        };
        info!(
            "Index rebuilt with {} chunks in {:.1?}",
            stats.chunks_created, stats.duration
        );
        Ok(stats)
    }

    /// Embed off the async runtime, handing the texts back alongside their vectors
    async fn embed(&self, texts: Vec<String>) -> Result<(Vec<String>, Vec<Vec<f32>>)> {
        let embedder = Arc::clone(&self.embedder);
        let (texts, vectors) = tokio::task::spawn_blocking(move || {
            let vectors = embedder.embed_documents(&texts);
            (texts, vectors)
        })
        .await
        .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?;

        let vectors = vectors.map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
        Ok((texts, vectors))
    }
}
