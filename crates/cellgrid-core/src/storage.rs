//! Object storage contract and the in-process implementation.
//!
//! Key layout:
//! - documents: `documents/company_{tenant}/{filename}`
//! - extracted markdown: `company/{tenant}/documents/{document_id}/extracted.md`
//! - chunk content: `company/{tenant}/documents/{document_id}/chunks/{chunk_id}`
//! - execution outputs: `companies/{tenant}/workflows/{workflow_id}/executions/{execution_id}/outputs/{name}`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::CoreResult;

/// Storage key for an uploaded document.
pub fn document_key(company_id: i64, filename: &str) -> String {
    format!("documents/company_{company_id}/{filename}")
}

/// Storage key for a document's combined extracted markdown.
pub fn extracted_markdown_key(company_id: i64, document_id: i64) -> String {
    format!("company/{company_id}/documents/{document_id}/extracted.md")
}

/// Storage prefix under which a document's chunk content lives.
pub fn chunk_prefix(company_id: i64, document_id: i64) -> String {
    format!("company/{company_id}/documents/{document_id}/chunks/")
}

/// Storage prefix for a workflow execution's outputs.
pub fn execution_output_prefix(company_id: i64, workflow_id: i64, execution_id: i64) -> String {
    format!("companies/{company_id}/workflows/{workflow_id}/executions/{execution_id}/outputs/")
}

/// Storage key of a workflow execution's manifest.
pub fn execution_manifest_key(company_id: i64, workflow_id: i64, execution_id: i64) -> String {
    format!(
        "companies/{company_id}/workflows/{workflow_id}/executions/{execution_id}/outputs/.manifest.json"
    )
}

/// Metadata returned by listing operations.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub key: String,
    pub size: usize,
    pub last_modified: DateTime<Utc>,
}

/// Narrow blob-store contract consumed by the engine.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: Option<HashMap<String, String>>,
    ) -> CoreResult<bool>;

    async fn download(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> CoreResult<bool>;

    async fn exists(&self, key: &str) -> CoreResult<bool>;

    async fn list_objects(&self, prefix: &str, limit: usize) -> CoreResult<Vec<ObjectMeta>>;

    async fn get_presigned_url(&self, key: &str, ttl: Duration) -> CoreResult<String>;

    async fn generate_presigned_upload_url(&self, key: &str, ttl: Duration)
        -> CoreResult<String>;

    /// Delete every object under a prefix, returning the count removed.
    async fn delete_prefix(&self, prefix: &str) -> CoreResult<usize>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    #[allow(dead_code)]
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

/// In-process object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects; used by upload-count assertions in tests.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStore {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: Option<HashMap<String, String>>,
    ) -> CoreResult<bool> {
        debug!(key, size = data.len(), "storing object");
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                metadata: metadata.unwrap_or_default(),
                last_modified: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn download(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.objects.get(key).map(|o| o.data.clone()))
    }

    async fn delete(&self, key: &str) -> CoreResult<bool> {
        Ok(self.objects.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.objects.contains_key(key))
    }

    async fn list_objects(&self, prefix: &str, limit: usize) -> CoreResult<Vec<ObjectMeta>> {
        let mut metas: Vec<ObjectMeta> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| ObjectMeta {
                key: entry.key().clone(),
                size: entry.value().data.len(),
                last_modified: entry.value().last_modified,
            })
            .collect();
        metas.sort_by(|a, b| a.key.cmp(&b.key));
        metas.truncate(limit);
        Ok(metas)
    }

    async fn get_presigned_url(&self, key: &str, ttl: Duration) -> CoreResult<String> {
        Ok(format!("memory://{key}?expires_in={}", ttl.as_secs()))
    }

    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> CoreResult<String> {
        Ok(format!("memory://upload/{key}?expires_in={}", ttl.as_secs()))
    }

    async fn delete_prefix(&self, prefix: &str) -> CoreResult<usize> {
        let keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let count = keys.len();
        for key in keys {
            self.objects.remove(&key);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let storage = MemoryObjectStore::new();
        let key = document_key(1, "report.pdf");
        storage.upload(&key, b"bytes".to_vec(), None).await.unwrap();
        assert!(storage.exists(&key).await.unwrap());
        assert_eq!(
            storage.download(&key).await.unwrap(),
            Some(b"bytes".to_vec())
        );
        assert_eq!(storage.download("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_removed() {
        let storage = MemoryObjectStore::new();
        let prefix = chunk_prefix(1, 5);
        for i in 0..3 {
            storage
                .upload(&format!("{prefix}{i}"), vec![0], None)
                .await
                .unwrap();
        }
        storage.upload("other/key", vec![0], None).await.unwrap();
        assert_eq!(storage.delete_prefix(&prefix).await.unwrap(), 3);
        assert!(storage.exists("other/key").await.unwrap());
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(document_key(7, "a.pdf"), "documents/company_7/a.pdf");
        assert_eq!(
            extracted_markdown_key(7, 12),
            "company/7/documents/12/extracted.md"
        );
        assert_eq!(
            execution_manifest_key(7, 3, 42),
            "companies/7/workflows/3/executions/42/outputs/.manifest.json"
        );
    }
}
