// Query service: holds the loaded vector index, answers questions with retrieved
// context and rebuilds the index in the background


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::indexer::{Indexer, IndexingStats};
use crate::{RagError, Result};

/// Separator placed between retrieved chunks in an answer's context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Whether the service can answer questions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Ready,
    NotReady { reason: String },
}

impl ServiceState {
    #[inline]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Retrieved grounding for a question, to be handed to a text generator
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: String,
    /// Retrieved chunk texts, closest first, separated by a blank line
    pub context: String,
    pub sources: Vec<SearchResult>,
}

/// Acknowledgment returned by [`RagService::rebuild`] before the rebuild finishes
#[derive(Debug)]
pub enum RebuildAck {
    Started(JoinHandle<Result<IndexingStats>>),
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub chunk_count: u64,
    pub rebuilding: bool,
}

enum LoadedIndex {
    Ready(VectorStore),
    NotReady(String),
}

impl LoadedIndex {
    fn state(&self) -> ServiceState {
        match self {
            Self::Ready(_) => ServiceState::Ready,
            Self::NotReady(reason) => ServiceState::NotReady {
                reason: reason.clone(),
            },
        }
    }
}

struct Inner {
    indexer: Indexer,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_db_path: PathBuf,
    region: String,
    top_k: usize,
    index: RwLock<LoadedIndex>,
    rebuilding: AtomicBool,
}

/// Explicitly constructed question-answering service.
///
/// Cloning is cheap and every clone shares the same index and rebuild guard.
#[derive(Clone)]
pub struct RagService {
    inner: Arc<Inner>,
}

impl RagService {
    /// Build the service and try to load an existing index.
    ///
    /// A missing or unreadable index leaves the service `NotReady` instead of failing.
    #[inline]
    pub async fn new(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let indexer = Indexer::new(config, Arc::clone(&embedder))?;
        Self::with_indexer(config, embedder, indexer).await
    }

    /// Build the service around an already configured indexer
    #[inline]
    pub async fn with_indexer(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        indexer: Indexer,
    ) -> Result<Self> {
        config
            .retrieval
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let vector_db_path = config.vector_database_path();
        let index = load_index(&vector_db_path).await;

        Ok(Self {
            inner: Arc::new(Inner {
                indexer,
                embedder,
                vector_db_path,
                region: config.agenda.region.clone(),
                top_k: config.retrieval.top_k,
                index: RwLock::new(index),
                rebuilding: AtomicBool::new(false),
            }),
        })
    }

    #[inline]
    pub async fn state(&self) -> ServiceState {
        self.inner.index.read().await.state()
    }

    /// Retrieve the configured number of chunks for a question
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        let sources = self.search(question, self.inner.top_k).await?;
        let context = sources
            .iter()
            .map(|source| source.content.as_str())
            .join(CONTEXT_SEPARATOR);

        info!(
            "Retrieved {} chunks for question of {} chars",
            sources.len(),
            question.chars().count()
        );

        Ok(Answer {
            question: question.to_string(),
            context,
            sources,
        })
    }

    /// The `limit` chunks closest to `query`, closest first
    #[inline]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let index = self.inner.index.read().await;
        let store = match &*index {
            LoadedIndex::Ready(store) => store,
            LoadedIndex::NotReady(reason) => return Err(RagError::NotReady(reason.clone())),
        };

        let embedder = Arc::clone(&self.inner.embedder);
        let text = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed_query(&text))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        debug!("Query embedded into {} dimensions", vector.len());
        store.search_similar(&vector, limit).await
    }

    /// Start a full rebuild on a background task and return immediately.
    ///
    /// At most one rebuild runs at a time. A successful rebuild reloads the index.
    #[inline]
    pub fn rebuild(&self) -> RebuildAck {
        if self
            .inner
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Rebuild requested while one is already running");
            return RebuildAck::AlreadyRunning;
        }

        let service = self.clone();
        let handle = tokio::spawn(async move {
            let result = service.run_rebuild().await;
            service.inner.rebuilding.store(false, Ordering::Release);
            result
        });

        info!("Index rebuild started in the background");
        RebuildAck::Started(handle)
    }

    #[inline]
    pub fn is_rebuilding(&self) -> bool {
        self.inner.rebuilding.load(Ordering::Acquire)
    }

    /// Reload the index from disk
    #[inline]
    pub async fn reload(&self) -> ServiceState {
        let loaded = load_index(&self.inner.vector_db_path).await;
        let state = loaded.state();
        *self.inner.index.write().await = loaded;
        state
    }

    #[inline]
    pub async fn status(&self) -> Result<ServiceStatus> {
        let index = self.inner.index.read().await;
        let chunk_count = match &*index {
            LoadedIndex::Ready(store) => store.count_embeddings().await?,
            LoadedIndex::NotReady(_) => 0,
        };

        Ok(ServiceStatus {
            state: index.state(),
            chunk_count,
            rebuilding: self.is_rebuilding(),
        })
    }

    async fn run_rebuild(&self) -> Result<IndexingStats> {
        match self.inner.indexer.rebuild(&self.inner.region).await {
            Ok(stats) => {
                let state = self.reload().await;
                info!(
                    "Background rebuild finished with {} chunks, service state: {:?}",
                    stats.chunks_created, state
                );
                Ok(stats)
            }
            Err(e) => {
                error!("Background rebuild failed: {}", e);
                Err(e)
            }
        }
    }
}

async fn load_index(path: &Path) -> LoadedIndex {
    let store = match VectorStore::open(path).await {
        Ok(store) => store,
        Err(e) => {
            warn!("Vector index unavailable: {}", e);
            return LoadedIndex::NotReady(e.to_string());
        }
    };

    match store.has_index().await {
        Ok(true) => {
            info!("Vector index loaded from {}", path.display());
            LoadedIndex::Ready(store)
        }
        Ok(false) => {
            warn!("No vector index at {}", path.display());
            LoadedIndex::NotReady("the vector index has not been built yet".to_string())
        }
        Err(e) => {
            warn!("Vector index unreadable: {}", e);
            LoadedIndex::NotReady(e.to_string())
        }
    }
}
