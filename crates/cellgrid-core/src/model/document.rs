//! Document rows and their extraction/indexing job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ExtractionStatus, JobStatus};

/// An uploaded document, deduplicated per tenant by content checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub company_id: i64,
    pub filename: String,
    pub storage_key: String,
    /// SHA-256 hex of the raw bytes; dedup key within the tenant.
    pub checksum: String,
    pub content_type: String,
    pub file_size: i64,
    pub use_agentic_chunking: bool,
    pub extraction_status: ExtractionStatus,
    pub extracted_content_path: Option<String>,
    pub extraction_started_at: Option<DateTime<Utc>>,
    pub extraction_completed_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub company_id: i64,
    pub filename: String,
    pub storage_key: String,
    pub checksum: String,
    pub content_type: String,
    pub file_size: i64,
    pub use_agentic_chunking: bool,
}

/// Extraction attempt for a document; at most one in-flight per document,
/// enforced by the deterministic workflow id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentExtractionJob {
    pub id: i64,
    pub document_id: i64,
    pub company_id: i64,
    pub status: JobStatus,
    pub worker_message_id: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Indexing attempt for a document's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIndexingJob {
    pub id: i64,
    pub document_id: i64,
    pub company_id: i64,
    pub status: JobStatus,
    pub worker_message_id: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
