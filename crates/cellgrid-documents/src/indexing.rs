//! Chunk indexing: content to object storage, records to both indexes.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use cellgrid_core::storage::{chunk_prefix, ObjectStorage};

use crate::error::DocumentResult;
use crate::search::{ChunkRecord, ChunkSearchService};

/// Indexes a document's chunks: each chunk's content goes to object
/// storage under the document's chunk prefix, and a record goes to the
/// keyword and vector indexes.
#[derive(Clone)]
pub struct ChunkIndexingService {
    search: ChunkSearchService,
    object_storage: Arc<dyn ObjectStorage>,
}

impl ChunkIndexingService {
    pub fn new(search: ChunkSearchService, object_storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            search,
            object_storage,
        }
    }

    /// Chunk ids are `{document_id}_{position}`, stable across re-indexing
    /// runs of the same chunking output.
    pub fn chunk_id(document_id: i64, position: usize) -> String {
        format!("{document_id}_{position}")
    }

    /// Index all chunks of a document. Returns the number indexed.
    pub async fn index_document_chunks(
        &self,
        company_id: i64,
        document_id: i64,
        chunks: &[String],
    ) -> DocumentResult<usize> {
        let prefix = chunk_prefix(company_id, document_id);
        let mut records = Vec::with_capacity(chunks.len());
        for (position, content) in chunks.iter().enumerate() {
            let chunk_id = Self::chunk_id(document_id, position);
            self.object_storage
                .upload(&format!("{prefix}{chunk_id}"), content.clone().into_bytes(), None)
                .await?;
            records.push(ChunkRecord {
                chunk_id,
                document_id,
                company_id,
                content: content.clone(),
                metadata: json!({
                    "document_id": document_id,
                    "position": position,
                }),
            });
        }

        let count = records.len();
        self.search.index_chunks_bulk(records).await?;
        info!(document_id, count, "indexed document chunks");
        Ok(count)
    }

    /// Drop a document's chunks from storage, returning the count removed.
    pub async fn delete_document_chunks(
        &self,
        company_id: i64,
        document_id: i64,
    ) -> DocumentResult<usize> {
        let removed = self
            .object_storage
            .delete_prefix(&chunk_prefix(company_id, document_id))
            .await?;
        Ok(removed)
    }
}
