//! # Cellgrid Workflows
//!
//! Durable workflow engine and the workflows that run on it.
//!
//! ## Components
//!
//! - [`engine`] — deterministic ids, `UseExisting` start policy, activity
//!   retries with backoff, cancellation
//! - [`document`] — extraction workflow, quota-gated chunking, indexing
//!   worker
//! - [`agent_qa`] — agent QA workflow owning its answer persistence
//! - [`execution`] — code/agent execution workflow and manifest handling
//! - [`tools`] — agent tool registry

pub mod agent_qa;
pub mod document;
pub mod engine;
pub mod error;
pub mod execution;
pub mod tools;

pub use agent_qa::AgentQaService;
pub use document::{
    DocumentExtractor, DocumentIndexingWorker, DocumentPipeline, ExtractionInput,
    ExtractionOutcome, PlainTextExtractor,
};
pub use engine::{
    retry_activity, task_queues, ConflictPolicy, RetryPolicy, TraceHeaders, WorkflowEngine,
    WorkflowHandle,
};
pub use error::{WorkflowError, WorkflowResult};
pub use execution::{AgentJobRunner, ExecutionService, JobPhase};
pub use tools::{AgentTool, ToolPermission, ToolRegistry, ToolSpec};
