//! Code/agent workflow execution records and the output manifest format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ExecutionStatus;

/// One execution of a code/agent workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: i64,
    pub workflow_id: i64,
    pub company_id: i64,
    pub status: ExecutionStatus,
    pub generated_files: Vec<GeneratedFile>,
    pub total_output_bytes: i64,
    pub result_metadata: Option<ExecutionMetadata>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A file recorded on an execution after manifest extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub size: i64,
    pub path: String,
    pub relative_path: String,
}

/// Manifest written next to an execution's outputs in object storage.
///
/// `execution_id` is serialized as a string to match the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionManifest {
    pub execution_id: String,
    pub output_files: Vec<GeneratedFile>,
    #[serde(default)]
    pub scratch_files: Vec<GeneratedFile>,
    pub metadata: ExecutionMetadata,
}

/// Result metadata block of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
