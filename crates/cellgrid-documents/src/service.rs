//! Document upload with content-addressed deduplication.
//!
//! Dedup order: stream hash, bloom pre-filter, authoritative store lookup,
//! and only then a storage write. A byte-identical re-upload returns the
//! existing row and touches neither object storage nor the filter.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use cellgrid_core::billing::UsageService;
use cellgrid_core::bloom::{document_checksum_filter, BloomFilterProvider};
use cellgrid_core::error::CoreError;
use cellgrid_core::model::{Document, NewDocument};
use cellgrid_core::storage::{document_key, ObjectStorage};
use cellgrid_core::store::Store;

use crate::error::{DocumentError, DocumentResult};

const HASH_BUFFER_SIZE: usize = 8192;

/// Upload options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct DocumentUploadOptions {
    pub use_agentic_chunking: bool,
    pub user_id: Option<i64>,
}

/// Upload, lookup, and dedup of documents.
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<Store>,
    object_storage: Arc<dyn ObjectStorage>,
    bloom: Arc<dyn BloomFilterProvider>,
    usage: UsageService,
}

impl DocumentService {
    pub fn new(
        store: Arc<Store>,
        object_storage: Arc<dyn ObjectStorage>,
        bloom: Arc<dyn BloomFilterProvider>,
    ) -> Self {
        Self {
            usage: UsageService::new(store.clone()),
            store,
            object_storage,
            bloom,
        }
    }

    /// SHA-256 over the content, hashed in small buffers the way a
    /// streaming upload would be.
    pub fn checksum(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        for chunk in content.chunks(HASH_BUFFER_SIZE) {
            hasher.update(chunk);
        }
        hex::encode(hasher.finalize())
    }

    /// Upload a document, returning `(document, is_duplicate)`.
    pub async fn upload_document(
        &self,
        company_id: i64,
        filename: &str,
        content_type: &str,
        content: &[u8],
        options: DocumentUploadOptions,
    ) -> DocumentResult<(Document, bool)> {
        if filename.is_empty() {
            return Err(DocumentError::InvalidUpload("filename is empty".into()));
        }

        let checksum = Self::checksum(content);
        if let Some(existing) = self.check_for_duplicate(company_id, &checksum).await {
            info!(
                document_id = existing.id,
                company_id, "duplicate upload, returning existing document"
            );
            return Ok((existing, true));
        }

        let storage_key = document_key(company_id, filename);
        self.object_storage
            .upload(&storage_key, content.to_vec(), None)
            .await?;

        let document = match self
            .store
            .insert_document(NewDocument {
                company_id,
                filename: filename.to_string(),
                storage_key: storage_key.clone(),
                checksum: checksum.clone(),
                content_type: content_type.to_string(),
                file_size: content.len() as i64,
                use_agentic_chunking: options.use_agentic_chunking,
            })
            .await
        {
            Ok(document) => document,
            // A racing insert beat us to the checksum row: dedup, not error.
            Err(CoreError::AlreadyExists(_)) => {
                let existing = self
                    .store
                    .find_document_by_checksum(company_id, &checksum)
                    .await
                    .ok_or_else(|| CoreError::Conflict(format!(
                        "checksum {checksum} raced but row is missing"
                    )))?;
                self.object_storage
                    .delete(&storage_key)
                    .await?;
                return Ok((existing, true));
            }
            Err(e) => return Err(e.into()),
        };

        self.bloom
            .add(&document_checksum_filter(company_id), &checksum)
            .await;
        self.usage
            .track_storage_upload(
                company_id,
                document.file_size,
                Some(document.id),
                Some(filename),
                options.user_id,
            )
            .await;
        info!(document_id = document.id, company_id, "uploaded new document");
        Ok((document, false))
    }

    /// Dedup check: bloom filter first, then the authoritative index. A
    /// bloom miss is definitive; a hit may be a false positive.
    async fn check_for_duplicate(&self, company_id: i64, checksum: &str) -> Option<Document> {
        let filter = document_checksum_filter(company_id);
        if !self.bloom.might_contain(&filter, checksum).await {
            debug!(company_id, "bloom filter miss, content is new");
            return None;
        }
        self.store.find_document_by_checksum(company_id, checksum).await
    }

    pub async fn get_document(&self, document_id: i64, company_id: i64) -> Option<Document> {
        self.store.get_document(document_id, company_id).await
    }
}
