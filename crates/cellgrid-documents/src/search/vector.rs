//! In-memory cosine-similarity vector index.

use async_trait::async_trait;
use tokio::sync::RwLock;

use cellgrid_core::error::{CoreError, CoreResult};

use super::{ChunkHit, ChunkRecord, ChunkSearchFilters, VectorSearchProvider};

struct IndexedEmbedding {
    chunk_id: String,
    document_id: i64,
    company_id: i64,
    metadata: serde_json::Value,
    embedding: Vec<f32>,
}

/// Brute-force cosine index over stored embeddings.
#[derive(Default)]
pub struct CosineVectorIndex {
    embeddings: RwLock<Vec<IndexedEmbedding>>,
}

impl CosineVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| (x * y) as f64).sum()
}

#[async_trait]
impl VectorSearchProvider for CosineVectorIndex {
    async fn index_embedding(
        &self,
        record: &ChunkRecord,
        embedding: Vec<f32>,
    ) -> CoreResult<()> {
        let mut embeddings = self.embeddings.write().await;
        embeddings.retain(|e| {
            !(e.chunk_id == record.chunk_id && e.document_id == record.document_id)
        });
        embeddings.push(IndexedEmbedding {
            chunk_id: record.chunk_id.clone(),
            document_id: record.document_id,
            company_id: record.company_id,
            metadata: record.metadata.clone(),
            embedding,
        });
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        filters: &ChunkSearchFilters,
        limit: usize,
    ) -> CoreResult<Vec<ChunkHit>> {
        let embeddings = self.embeddings.read().await;
        let mut hits: Vec<ChunkHit> = embeddings
            .iter()
            .filter(|e| {
                // Reuse the record-shaped filter by viewing the entry.
                filters.matches(&ChunkRecord {
                    chunk_id: e.chunk_id.clone(),
                    document_id: e.document_id,
                    company_id: e.company_id,
                    content: String::new(),
                    metadata: e.metadata.clone(),
                })
            })
            .map(|e| ChunkHit {
                chunk_id: e.chunk_id.clone(),
                document_id: e.document_id,
                company_id: e.company_id,
                score: cosine(query_embedding, &e.embedding),
                content: None,
            })
            .filter(|h| h.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_chunk(&self, chunk_id: &str, document_id: i64) -> CoreResult<bool> {
        let mut embeddings = self.embeddings.write().await;
        let before = embeddings.len();
        embeddings.retain(|e| !(e.chunk_id == chunk_id && e.document_id == document_id));
        Ok(embeddings.len() != before)
    }
}

/// Vector provider whose every call fails; exercises the keyword-only
/// fallback path.
#[derive(Default)]
pub struct FailingVectorSearch;

#[async_trait]
impl VectorSearchProvider for FailingVectorSearch {
    async fn index_embedding(
        &self,
        _record: &ChunkRecord,
        _embedding: Vec<f32>,
    ) -> CoreResult<()> {
        Err(CoreError::Storage("vector index unavailable".into()))
    }

    async fn search(
        &self,
        _query_embedding: &[f32],
        _filters: &ChunkSearchFilters,
        _limit: usize,
    ) -> CoreResult<Vec<ChunkHit>> {
        Err(CoreError::Storage("vector index unavailable".into()))
    }

    async fn delete_chunk(&self, _chunk_id: &str, _document_id: i64) -> CoreResult<bool> {
        Err(CoreError::Storage("vector index unavailable".into()))
    }
}
