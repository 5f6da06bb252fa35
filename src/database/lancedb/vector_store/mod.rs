
use super::EmbeddingRecord;
use crate::processing::ChunkMetadata;
use crate::{RagError, Result, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TABLE_NAME: &str = "event_chunks";

/// Nullable metadata columns, in schema order
const METADATA_COLUMNS: [&str; 10] = [
    "event_id",
    "title",
    "start_date",
    "end_date",
    "city",
    "postal_code",
    "address",
    "location_name",
    "keywords",
    "url",
];

/// Vector database store using LanceDB for similarity search over event chunks
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

/// A chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Distance to the query vector, smaller is closer
    pub distance: f32,
}

impl VectorStore {
    /// Open the store configured for this installation
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::open(&config.vector_database_path()).await
    }

    /// Connect to the LanceDB database at `db_path`, creating the directory if needed.
    /// The chunk table itself only exists once an index was built.
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
        })
    }

    /// Whether an index has been built
    #[inline]
    pub async fn has_index(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Dimension of the stored vectors, if an index exists
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>> {
        if !self.has_index().await? {
            return Ok(None);
        }

        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        Ok(schema.fields().iter().find_map(|field| {
            match (field.name().as_str(), field.data_type()) {
                ("vector", DataType::FixedSizeList(_, size)) => usize::try_from(*size).ok(),
                _ => None,
            }
        }))
    }

    /// Replace the whole index with `records`.
    ///
    /// All vectors must share one non-zero dimension. The existing table is only
    /// dropped once the new rows were converted successfully.
    #[inline]
    pub async fn replace_all(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Err(RagError::Database(
                "Refusing to replace the index with zero records".to_string(),
            ));
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(RagError::Database("Embedding vectors are empty".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Inconsistent vector dimensions: expected {}, got {} for chunk {}",
                vector_dim,
                bad.vector.len(),
                bad.metadata.chunk_id
            )));
        }

        info!(
            "Replacing index with {} chunks ({} dimensions)",
            records.len(),
            vector_dim
        );

        let record_batch = Self::create_record_batch(records, vector_dim)?;

        self.drop_table_if_exists().await?;

        let schema = record_batch.schema();
        self.connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        let table = self.open_table().await?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    /// The `limit` chunks closest to `query_vector`, closest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if limit == 0 {
            return Ok(Vec::new());
        }
        if !self.has_index().await? {
            return Err(RagError::NotReady(
                "the vector index has not been built yet".to_string(),
            ));
        }

        let table = self.open_table().await?;
        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        debug!("Found {} similar chunks", search_results.len());
        Ok(search_results)
    }

    /// Number of stored chunks, zero when no index exists
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        if !self.has_index().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.has_index().await? {
            info!("Dropping existing {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension too large: {}", vector_dim)))?;

        let mut fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dim),
                false,
            ),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
        ];
        fields.extend(
            METADATA_COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true)),
        );
        fields.push(Field::new("source", DataType::Utf8, false));
        fields.push(Field::new("created_at", DataType::Utf8, false));

        Ok(Arc::new(Schema::new(fields)))
    }

    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let schema = Self::create_schema(vector_dim)?;
        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension too large: {}", vector_dim)))?;

        let flat_values: Vec<f32> = records
            .iter()
            .flat_map(|r| r.vector.iter().copied())
            .collect();
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            dim,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let text_column = |get: fn(&EmbeddingRecord) -> &str| -> Arc<dyn Array> {
            Arc::new(StringArray::from(records.iter().map(get).collect::<Vec<_>>()))
        };
        let metadata_column = |get: fn(&ChunkMetadata) -> Option<&str>| -> Arc<dyn Array> {
            Arc::new(StringArray::from(
                records.iter().map(|r| get(&r.metadata)).collect::<Vec<_>>(),
            ))
        };

        let arrays: Vec<Arc<dyn Array>> = vec![
            text_column(|r| r.id.as_str()),
            Arc::new(vector_array),
            text_column(|r| r.metadata.chunk_id.as_str()),
            text_column(|r| r.content.as_str()),
            metadata_column(|m| m.event_id.as_deref()),
            metadata_column(|m| m.title.as_deref()),
            metadata_column(|m| m.start_date.as_deref()),
            metadata_column(|m| m.end_date.as_deref()),
            metadata_column(|m| m.city.as_deref()),
            metadata_column(|m| m.postal_code.as_deref()),
            metadata_column(|m| m.address.as_deref()),
            metadata_column(|m| m.location_name.as_deref()),
            metadata_column(|m| m.keywords.as_deref()),
            metadata_column(|m| m.url.as_deref()),
            text_column(|r| r.metadata.source.as_str()),
            text_column(|r| r.created_at.as_str()),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let chunk_ids = string_column(batch, "chunk_id")?;
        let contents = string_column(batch, "content")?;
        let sources = string_column(batch, "source")?;
        let metadata_columns = METADATA_COLUMNS
            .iter()
            .map(|name| string_column(batch, name))
            .collect::<Result<Vec<_>>>()?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());
        if distances.is_none() {
            warn!("Search results carry no _distance column");
        }

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let value = |column: usize| optional_value(metadata_columns[column], row);
            let metadata = ChunkMetadata {
                event_id: value(0),
                title: value(1),
                start_date: value(2),
                end_date: value(3),
                city: value(4),
                postal_code: value(5),
                address: value(6),
                location_name: value(7),
                keywords: value(8),
                url: value(9),
                chunk_id: chunk_ids.value(row).to_string(),
                source: sources.value(row).to_string(),
            };

            let distance = distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                content: contents.value(row).to_string(),
                metadata,
                distance,
            });
        }

        Ok(search_results)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn optional_value(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}
