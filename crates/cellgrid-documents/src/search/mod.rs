//! Hybrid chunk search: BM25 keyword ranking fused with vector similarity.

mod embeddings;
mod keyword;
mod service;
mod vector;

pub use embeddings::{EmbeddingProvider, HashEmbedder};
pub use keyword::Bm25KeywordIndex;
pub use service::ChunkSearchService;
pub use vector::{CosineVectorIndex, FailingVectorSearch};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cellgrid_core::error::CoreResult;

/// A chunk as handed to the indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: i64,
    pub company_id: i64,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Search filters; the tenant is always set.
#[derive(Debug, Clone)]
pub struct ChunkSearchFilters {
    pub company_id: i64,
    pub document_ids: Option<Vec<i64>>,
    pub matrix_id: Option<i64>,
    pub entity_set_id: Option<i64>,
}

impl ChunkSearchFilters {
    pub fn for_company(company_id: i64) -> Self {
        Self {
            company_id,
            document_ids: None,
            matrix_id: None,
            entity_set_id: None,
        }
    }

    /// Whether a chunk passes the tenant/document/metadata filters.
    pub(crate) fn matches(&self, record: &ChunkRecord) -> bool {
        if record.company_id != self.company_id {
            return false;
        }
        if let Some(document_ids) = &self.document_ids {
            if !document_ids.contains(&record.document_id) {
                return false;
            }
        }
        if let Some(matrix_id) = self.matrix_id {
            if record.metadata["matrix_id"] != serde_json::json!(matrix_id) {
                return false;
            }
        }
        if let Some(entity_set_id) = self.entity_set_id {
            if record.metadata["entity_set_id"] != serde_json::json!(entity_set_id) {
                return false;
            }
        }
        true
    }
}

/// A ranked chunk. Content is lazily hydrated from object storage for the
/// requested page only.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub document_id: i64,
    pub company_id: i64,
    pub score: f64,
    pub content: Option<String>,
}

/// Page of ranked chunks.
#[derive(Debug, Clone, Default)]
pub struct ChunkSearchResult {
    pub chunks: Vec<ChunkHit>,
    pub total_count: usize,
    pub has_more: bool,
}

/// Keyword (BM25) index contract; authoritative for availability.
#[async_trait]
pub trait KeywordSearchProvider: Send + Sync {
    async fn index_chunk(&self, record: ChunkRecord) -> CoreResult<()>;

    async fn index_chunks_bulk(&self, records: Vec<ChunkRecord>) -> CoreResult<()>;

    async fn search(
        &self,
        query: &str,
        filters: &ChunkSearchFilters,
        limit: usize,
    ) -> CoreResult<Vec<ChunkHit>>;

    async fn delete_chunk(&self, chunk_id: &str, document_id: i64) -> CoreResult<bool>;
}

/// Vector index contract; best-effort alongside the keyword index.
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    async fn index_embedding(
        &self,
        record: &ChunkRecord,
        embedding: Vec<f32>,
    ) -> CoreResult<()>;

    async fn search(
        &self,
        query_embedding: &[f32],
        filters: &ChunkSearchFilters,
        limit: usize,
    ) -> CoreResult<Vec<ChunkHit>>;

    async fn delete_chunk(&self, chunk_id: &str, document_id: i64) -> CoreResult<bool>;
}

/// Lowercased alphanumeric tokens of a text.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
