//! In-memory BM25 keyword index.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use cellgrid_core::error::CoreResult;

use super::{tokenize, ChunkHit, ChunkRecord, ChunkSearchFilters, KeywordSearchProvider};

const K1: f64 = 1.2;
const B: f64 = 0.75;

struct IndexedChunk {
    record: ChunkRecord,
    term_frequencies: HashMap<String, u32>,
    length: f64,
}

/// BM25 over tokenized chunk content. Document frequencies are computed
/// over the filtered corpus at query time, so tenant isolation also applies
/// to the statistics.
#[derive(Default)]
pub struct Bm25KeywordIndex {
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl Bm25KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn indexed(record: ChunkRecord) -> IndexedChunk {
        let tokens = tokenize(&record.content);
        let mut term_frequencies = HashMap::new();
        for token in &tokens {
            *term_frequencies.entry(token.clone()).or_insert(0) += 1;
        }
        IndexedChunk {
            length: tokens.len() as f64,
            term_frequencies,
            record,
        }
    }
}

#[async_trait]
impl KeywordSearchProvider for Bm25KeywordIndex {
    async fn index_chunk(&self, record: ChunkRecord) -> CoreResult<()> {
        let mut chunks = self.chunks.write().await;
        chunks.retain(|c| {
            !(c.record.chunk_id == record.chunk_id
                && c.record.document_id == record.document_id)
        });
        chunks.push(Self::indexed(record));
        Ok(())
    }

    async fn index_chunks_bulk(&self, records: Vec<ChunkRecord>) -> CoreResult<()> {
        let mut chunks = self.chunks.write().await;
        for record in records {
            chunks.retain(|c| {
                !(c.record.chunk_id == record.chunk_id
                    && c.record.document_id == record.document_id)
            });
            chunks.push(Self::indexed(record));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        filters: &ChunkSearchFilters,
        limit: usize,
    ) -> CoreResult<Vec<ChunkHit>> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read().await;
        let corpus: Vec<&IndexedChunk> = chunks
            .iter()
            .filter(|c| filters.matches(&c.record))
            .collect();
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let corpus_size = corpus.len() as f64;
        let average_length =
            corpus.iter().map(|c| c.length).sum::<f64>() / corpus_size;

        // Per-term document frequencies over the filtered corpus.
        let mut document_frequencies: HashMap<&str, f64> = HashMap::new();
        for term in &query_terms {
            let df = corpus
                .iter()
                .filter(|c| c.term_frequencies.contains_key(term))
                .count() as f64;
            document_frequencies.insert(term.as_str(), df);
        }

        let mut hits: Vec<ChunkHit> = corpus
            .iter()
            .filter_map(|chunk| {
                let mut score = 0.0;
                for term in &query_terms {
                    let tf = *chunk.term_frequencies.get(term).unwrap_or(&0) as f64;
                    if tf == 0.0 {
                        continue;
                    }
                    let df = document_frequencies[term.as_str()];
                    let idf = ((corpus_size - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let denominator =
                        tf + K1 * (1.0 - B + B * chunk.length / average_length);
                    score += idf * tf * (K1 + 1.0) / denominator;
                }
                (score > 0.0).then(|| ChunkHit {
                    chunk_id: chunk.record.chunk_id.clone(),
                    document_id: chunk.record.document_id,
                    company_id: chunk.record.company_id,
                    score,
                    content: None,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        debug!(query, results = hits.len(), "keyword search");
        Ok(hits)
    }

    async fn delete_chunk(&self, chunk_id: &str, document_id: i64) -> CoreResult<bool> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| {
            !(c.record.chunk_id == chunk_id && c.record.document_id == document_id)
        });
        Ok(chunks.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chunk_id: &str, document_id: i64, company_id: i64, content: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_id: chunk_id.into(),
            document_id,
            company_id,
            content: content.into(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_ranks_term_matches_above_noise() {
        let index = Bm25KeywordIndex::new();
        index
            .index_chunks_bulk(vec![
                record("0", 1, 1, "the termination clause requires ninety days notice"),
                record("1", 1, 1, "payment is due within thirty days"),
                record("2", 1, 1, "termination for cause is immediate"),
            ])
            .await
            .unwrap();

        let hits = index
            .search("termination", &ChunkSearchFilters::for_company(1), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.chunk_id == "0" || h.chunk_id == "2"));
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let index = Bm25KeywordIndex::new();
        index
            .index_chunk(record("0", 1, 1, "confidential tenant one"))
            .await
            .unwrap();
        index
            .index_chunk(record("0", 2, 2, "confidential tenant two"))
            .await
            .unwrap();

        let hits = index
            .search("confidential", &ChunkSearchFilters::for_company(1), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].company_id, 1);
    }

    #[tokio::test]
    async fn test_document_filter() {
        let index = Bm25KeywordIndex::new();
        index
            .index_chunk(record("0", 1, 1, "shared term"))
            .await
            .unwrap();
        index
            .index_chunk(record("0", 2, 1, "shared term"))
            .await
            .unwrap();

        let mut filters = ChunkSearchFilters::for_company(1);
        filters.document_ids = Some(vec![2]);
        let hits = index.search("shared", &filters, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, 2);
    }

    #[tokio::test]
    async fn test_reindexing_replaces_chunk() {
        let index = Bm25KeywordIndex::new();
        index.index_chunk(record("0", 1, 1, "old text")).await.unwrap();
        index.index_chunk(record("0", 1, 1, "new text")).await.unwrap();

        assert!(index
            .search("old", &ChunkSearchFilters::for_company(1), 10)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            index
                .search("new", &ChunkSearchFilters::for_company(1), 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
