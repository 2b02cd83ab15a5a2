//! Workflow subsystem error types.

use thiserror::Error;

use cellgrid_core::error::CoreError;
use cellgrid_documents::error::DocumentError;
use cellgrid_matrix::error::MatrixError;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors raised by the engine and the workflows it runs.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Underlying store/provider failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Document pipeline failure
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Matrix/QA failure
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// An activity exhausted its retry budget
    #[error("activity {activity} exhausted retries: {source}")]
    RetriesExhausted {
        activity: String,
        #[source]
        source: CoreError,
    },

    /// A workflow with this id is already running and the start policy
    /// forbids attaching
    #[error("workflow {0} already running")]
    AlreadyRunning(String),

    /// The workflow was cancelled through the engine
    #[error("workflow {0} cancelled")]
    Cancelled(String),
}

impl WorkflowError {
    /// Human-readable message recorded on failed jobs and documents.
    pub fn status_message(&self) -> String {
        self.to_string()
    }
}
