//! Matrix subsystem error types.

use thiserror::Error;

use cellgrid_core::error::CoreError;

/// Result type for matrix operations.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// Errors raised by entity-set, strategy, batch, and QA operations.
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Underlying store/provider failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A cell's refs do not satisfy its declared type
    #[error("malformed cell {cell_id}: {reason}")]
    MalformedCell { cell_id: i64, reason: String },

    /// A strategy was asked about an entity set it cannot handle
    #[error("strategy error: {0}")]
    Strategy(String),
}

impl MatrixError {
    pub fn strategy(msg: impl Into<String>) -> Self {
        Self::Strategy(msg.into())
    }
}
