//! Hybrid search service: parallel keyword + vector, RRF fusion, lazy
//! content hydration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use cellgrid_core::config::SearchConfig;
use cellgrid_core::error::CoreResult;
use cellgrid_core::storage::{chunk_prefix, ObjectStorage};

use super::{
    ChunkHit, ChunkRecord, ChunkSearchFilters, ChunkSearchResult, EmbeddingProvider,
    KeywordSearchProvider, VectorSearchProvider,
};

/// Hybrid chunk search over the keyword and vector providers.
#[derive(Clone)]
pub struct ChunkSearchService {
    keyword: Arc<dyn KeywordSearchProvider>,
    vector: Arc<dyn VectorSearchProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    object_storage: Arc<dyn ObjectStorage>,
    config: SearchConfig,
}

impl ChunkSearchService {
    pub fn new(
        keyword: Arc<dyn KeywordSearchProvider>,
        vector: Arc<dyn VectorSearchProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        object_storage: Arc<dyn ObjectStorage>,
        config: SearchConfig,
    ) -> Self {
        Self {
            keyword,
            vector,
            embeddings,
            object_storage,
            config,
        }
    }

    /// Index chunks for both sides. The keyword write is authoritative; a
    /// vector-side failure is logged and swallowed so keyword search still
    /// works.
    pub async fn index_chunks_bulk(&self, records: Vec<ChunkRecord>) -> CoreResult<()> {
        self.keyword.index_chunks_bulk(records.clone()).await?;

        let contents: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        match self.embeddings.embed_batch(&contents).await {
            Ok(embeddings) => {
                for (record, embedding) in records.iter().zip(embeddings) {
                    if let Err(e) = self.vector.index_embedding(record, embedding).await {
                        warn!(chunk_id = %record.chunk_id, error = %e, "failed to index vector embedding");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to embed chunk batch, keyword search still works");
            }
        }
        Ok(())
    }

    /// Keyword + vector search in parallel, fused with reciprocal rank
    /// fusion. A vector-side failure returns the keyword ranking unchanged.
    pub async fn hybrid_search(
        &self,
        query: &str,
        filters: &ChunkSearchFilters,
        skip: usize,
        limit: usize,
        use_vector: bool,
    ) -> CoreResult<ChunkSearchResult> {
        // Over-fetch candidates so fusion has room to reorder.
        let candidates = limit.saturating_mul(self.config.candidate_multiplier).max(limit);

        let keyword_side = self.keyword.search(query, filters, candidates);
        let vector_side = async {
            if !use_vector {
                return None;
            }
            let embedding = match self.embeddings.embed(query).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(error = %e, "query embedding failed, using keyword-only");
                    return None;
                }
            };
            match self.vector.search(&embedding, filters, candidates).await {
                Ok(hits) => Some(hits),
                Err(e) => {
                    warn!(error = %e, "vector search failed, using keyword-only");
                    None
                }
            }
        };
        let (keyword_hits, vector_hits) = tokio::join!(keyword_side, vector_side);
        let keyword_hits = keyword_hits?;

        let fused = match vector_hits {
            Some(vector_hits) if !vector_hits.is_empty() => {
                self.reciprocal_rank_fusion(keyword_hits, vector_hits)
            }
            _ => keyword_hits,
        };

        let total_count = fused.len();
        let page: Vec<ChunkHit> = fused.into_iter().skip(skip).take(limit).collect();
        let page = self.hydrate_content(page).await;
        debug!(query, total_count, returned = page.len(), "hybrid search");
        Ok(ChunkSearchResult {
            chunks: page,
            total_count,
            has_more: skip + limit < total_count,
        })
    }

    /// Fuse two rankings: each list contributes `1/(k + rank)` per chunk,
    /// keyed by `(document_id, chunk_id)`.
    fn reciprocal_rank_fusion(
        &self,
        keyword_hits: Vec<ChunkHit>,
        vector_hits: Vec<ChunkHit>,
    ) -> Vec<ChunkHit> {
        let k = self.config.rrf_k as f64;
        let mut scores: HashMap<(i64, String), (ChunkHit, f64)> = HashMap::new();
        for hits in [keyword_hits, vector_hits] {
            for (rank, hit) in hits.into_iter().enumerate() {
                let key = (hit.document_id, hit.chunk_id.clone());
                let contribution = 1.0 / (k + (rank + 1) as f64);
                scores
                    .entry(key)
                    .and_modify(|(_, score)| *score += contribution)
                    .or_insert((hit, contribution));
            }
        }
        let mut fused: Vec<ChunkHit> = scores
            .into_values()
            .map(|(mut hit, score)| {
                hit.score = score;
                hit
            })
            .collect();
        fused.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        fused
    }

    /// Fetch chunk content from object storage for the page. A missing
    /// object leaves the hit without content rather than failing the search.
    async fn hydrate_content(&self, mut hits: Vec<ChunkHit>) -> Vec<ChunkHit> {
        for hit in &mut hits {
            let key = format!(
                "{}{}",
                chunk_prefix(hit.company_id, hit.document_id),
                hit.chunk_id
            );
            match self.object_storage.download(&key).await {
                Ok(Some(bytes)) => {
                    hit.content = Some(String::from_utf8_lossy(&bytes).into_owned());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(chunk_id = %hit.chunk_id, error = %e, "failed to hydrate chunk content");
                }
            }
        }
        hits
    }

    pub async fn delete_chunk(&self, chunk_id: &str, document_id: i64) -> CoreResult<bool> {
        let keyword_deleted = self.keyword.delete_chunk(chunk_id, document_id).await?;
        let vector_deleted = self
            .vector
            .delete_chunk(chunk_id, document_id)
            .await
            .unwrap_or(false);
        Ok(keyword_deleted && vector_deleted)
    }
}
