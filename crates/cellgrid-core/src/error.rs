//! Core error types and result definitions.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors shared across the cellgrid engine.
///
/// Variants correspond to the logical error kinds every public boundary
/// reports; provider-specific failures are folded into the transient
/// variants so callers can decide whether a retry is worthwhile.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Entity not found
    #[error("{0} not found")]
    NotFound(String),

    /// Insert would duplicate an existing row (member, checksum, subscription)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-lock or signature collision
    #[error("conflict: {0}")]
    Conflict(String),

    /// Tenant is at its limit for a metered counter
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Another holder owns the resource lock
    #[error("lock unavailable for {0}")]
    LockUnavailable(String),

    /// Transient broker failure (publish, declare)
    #[error("broker error: {0}")]
    Broker(String),

    /// Transient object-storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Transient AI provider failure
    #[error("AI provider error: {0}")]
    AiProvider(String),

    /// Input failed domain validation
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-retryable provider failure
    #[error("permanent provider error: {0}")]
    PermanentProvider(String),

    /// Serialization/deserialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invariant violation inside the engine
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create a not found error for an entity with an id.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the workflow engine should retry an activity that failed
    /// with this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Broker(_) | CoreError::Storage(_) | CoreError::AiProvider(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CoreError::Broker("publish failed".into()).is_transient());
        assert!(CoreError::Storage("timeout".into()).is_transient());
        assert!(!CoreError::QuotaExceeded("agentic chunking".into()).is_transient());
        assert!(!CoreError::not_found("matrix cell", 42).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::not_found("document", 7);
        assert_eq!(err.to_string(), "document 7 not found");
        let err = CoreError::LockUnavailable("matrix_cell:9".into());
        assert_eq!(err.to_string(), "lock unavailable for matrix_cell:9");
    }
}
