//! Document and extraction/indexing job operations.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Document, DocumentExtractionJob, DocumentIndexingJob, ExtractionStatus, JobStatus,
    NewDocument,
};

use super::Store;

impl Store {
    /// Insert a document, enforcing the per-tenant checksum unique predicate.
    pub async fn insert_document(&self, new: NewDocument) -> CoreResult<Document> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.documents.iter().any(|d| {
            d.company_id == new.company_id && d.checksum == new.checksum && !d.deleted
        });
        if duplicate {
            return Err(CoreError::AlreadyExists(format!(
                "document with checksum {} for company {}",
                new.checksum, new.company_id
            )));
        }
        let now = Utc::now();
        let id = tables.documents.insert_with(|id| Document {
            id,
            company_id: new.company_id,
            filename: new.filename.clone(),
            storage_key: new.storage_key.clone(),
            checksum: new.checksum.clone(),
            content_type: new.content_type.clone(),
            file_size: new.file_size,
            use_agentic_chunking: new.use_agentic_chunking,
            extraction_status: ExtractionStatus::Pending,
            extracted_content_path: None,
            extraction_started_at: None,
            extraction_completed_at: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        });
        Ok(tables.documents.get(id).cloned().expect("row just inserted"))
    }

    pub async fn get_document(&self, document_id: i64, company_id: i64) -> Option<Document> {
        let tables = self.tables.read().await;
        tables
            .documents
            .get(document_id)
            .filter(|d| d.company_id == company_id && !d.deleted)
            .cloned()
    }

    /// Authoritative dedup lookup; the bloom filter is only a pre-filter.
    pub async fn find_document_by_checksum(
        &self,
        company_id: i64,
        checksum: &str,
    ) -> Option<Document> {
        let tables = self.tables.read().await;
        let result = tables
            .documents
            .iter()
            .find(|d| d.company_id == company_id && d.checksum == checksum && !d.deleted)
            .cloned();
        result
    }

    /// Documents whose extraction has failed, oldest first, up to `limit`.
    pub async fn failed_extraction_documents(&self, limit: usize) -> Vec<Document> {
        let tables = self.tables.read().await;
        tables
            .documents
            .iter()
            .filter(|d| d.extraction_status == ExtractionStatus::Failed && !d.deleted)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Only the document pipeline workflow writes extraction fields.
    pub async fn update_document_extraction(
        &self,
        document_id: i64,
        company_id: i64,
        status: ExtractionStatus,
        extracted_content_path: Option<String>,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let doc = tables
            .documents
            .get_mut(document_id)
            .filter(|d| d.company_id == company_id && !d.deleted)
            .ok_or_else(|| CoreError::not_found("document", document_id))?;
        doc.extraction_status = status;
        if extracted_content_path.is_some() {
            doc.extracted_content_path = extracted_content_path;
        }
        if started_at.is_some() {
            doc.extraction_started_at = started_at;
        }
        if completed_at.is_some() {
            doc.extraction_completed_at = completed_at;
        }
        doc.updated_at = Utc::now();
        Ok(())
    }

    pub async fn insert_extraction_job(
        &self,
        document_id: i64,
        company_id: i64,
    ) -> DocumentExtractionJob {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.extraction_jobs.insert_with(|id| DocumentExtractionJob {
            id,
            document_id,
            company_id,
            status: JobStatus::Queued,
            worker_message_id: None,
            error_message: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        });
        tables
            .extraction_jobs
            .get(id)
            .cloned()
            .expect("row just inserted")
    }

    pub async fn get_extraction_job(&self, job_id: i64) -> Option<DocumentExtractionJob> {
        let tables = self.tables.read().await;
        tables.extraction_jobs.get(job_id).cloned()
    }

    pub async fn update_extraction_job(
        &self,
        job_id: i64,
        status: JobStatus,
        worker_message_id: Option<String>,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let job = tables
            .extraction_jobs
            .get_mut(job_id)
            .ok_or_else(|| CoreError::not_found("extraction job", job_id))?;
        job.status = status;
        if worker_message_id.is_some() {
            job.worker_message_id = worker_message_id;
        }
        if error_message.is_some() {
            job.error_message = error_message;
        }
        if completed_at.is_some() {
            job.completed_at = completed_at;
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    pub async fn insert_indexing_job(
        &self,
        document_id: i64,
        company_id: i64,
    ) -> DocumentIndexingJob {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.indexing_jobs.insert_with(|id| DocumentIndexingJob {
            id,
            document_id,
            company_id,
            status: JobStatus::Queued,
            worker_message_id: None,
            error_message: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        });
        tables
            .indexing_jobs
            .get(id)
            .cloned()
            .expect("row just inserted")
    }

    pub async fn get_indexing_job(&self, job_id: i64) -> Option<DocumentIndexingJob> {
        let tables = self.tables.read().await;
        tables.indexing_jobs.get(job_id).cloned()
    }

    pub async fn update_indexing_job(
        &self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let job = tables
            .indexing_jobs
            .get_mut(job_id)
            .ok_or_else(|| CoreError::not_found("indexing job", job_id))?;
        job.status = status;
        if error_message.is_some() {
            job.error_message = error_message;
        }
        if completed_at.is_some() {
            job.completed_at = completed_at;
        }
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doc(company_id: i64, checksum: &str) -> NewDocument {
        NewDocument {
            company_id,
            filename: "a.pdf".into(),
            storage_key: format!("documents/company_{company_id}/a.pdf"),
            checksum: checksum.into(),
            content_type: "application/pdf".into(),
            file_size: 10,
            use_agentic_chunking: false,
        }
    }

    #[tokio::test]
    async fn test_checksum_unique_per_tenant() {
        let store = Store::new();
        store.insert_document(new_doc(1, "abc")).await.unwrap();
        let err = store.insert_document(new_doc(1, "abc")).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));

        // Same checksum in another tenant is fine.
        store.insert_document(new_doc(2, "abc")).await.unwrap();
    }

    #[tokio::test]
    async fn test_find_by_checksum_ignores_deleted() {
        let store = Store::new();
        let doc = store.insert_document(new_doc(1, "abc")).await.unwrap();
        assert_eq!(
            store.find_document_by_checksum(1, "abc").await.map(|d| d.id),
            Some(doc.id)
        );
        assert!(store.find_document_by_checksum(2, "abc").await.is_none());
    }
}
