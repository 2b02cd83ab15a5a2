//! Shared enumerations for the cellgrid data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fan-out shape of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixType {
    Standard,
    Correlation,
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Correlation => write!(f, "correlation"),
        }
    }
}

/// Processing status of a matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixCellStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for MatrixCellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Shape of a single cell; mirrors the matrix type that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Standard,
    Correlation,
}

/// Kind of entity an entity set holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Document,
    Question,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Question => write!(f, "question"),
        }
    }
}

/// Axis identifier of a cell entity reference.
///
/// The derived ordering (`Left < Right < Document < Question`) is the fixed
/// role order used when computing cell signatures; changing it invalidates
/// every stored signature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Left,
    Right,
    Document,
    Question,
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Document => write!(f, "document"),
            Self::Question => write!(f, "question"),
        }
    }
}

/// Status shared by QA, extraction, and indexing jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Extraction lifecycle of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Billing tier of a tenant subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Enterprise,
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Suspended,
}

/// Metered counter a usage event contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEventType {
    CellOperation,
    AgenticQa,
    AgenticChunking,
    Workflow,
    StorageUpload,
}

impl fmt::Display for UsageEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellOperation => write!(f, "cell_operation"),
            Self::AgenticQa => write!(f, "agentic_qa"),
            Self::AgenticChunking => write!(f, "agentic_chunking"),
            Self::Workflow => write!(f, "workflow"),
            Self::StorageUpload => write!(f, "storage_upload"),
        }
    }
}

/// Answer shape a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Date,
    Currency,
    Select,
}

/// Strategy used to split extracted markdown into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Sentence,
    Agentic,
}

/// Lifecycle status of a code/agent workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering_is_fixed() {
        // Signature stability depends on this exact order.
        let mut roles = vec![
            EntityRole::Question,
            EntityRole::Document,
            EntityRole::Right,
            EntityRole::Left,
        ];
        roles.sort();
        assert_eq!(
            roles,
            vec![
                EntityRole::Left,
                EntityRole::Right,
                EntityRole::Document,
                EntityRole::Question,
            ]
        );
    }

    #[test]
    fn test_snake_case_serialization() {
        assert_eq!(
            serde_json::to_string(&UsageEventType::AgenticChunking).unwrap(),
            "\"agentic_chunking\""
        );
        assert_eq!(
            serde_json::to_string(&MatrixType::Correlation).unwrap(),
            "\"correlation\""
        );
    }
}
