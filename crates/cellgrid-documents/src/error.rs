//! Document subsystem error types.

use thiserror::Error;

use cellgrid_core::error::CoreError;

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors raised by upload, chunking, indexing, and search.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Underlying store/provider failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Upload payload failed validation
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Chunking produced no usable chunks
    #[error("chunking failed for document {document_id}: {reason}")]
    ChunkingFailed { document_id: i64, reason: String },
}
