//! Tenant-scoped data model for the cellgrid engine.
//!
//! Every persisted row carries `company_id` (the tenant) and a `deleted`
//! soft-delete flag. Primary keys are dense `i64` values allocated by the
//! store's per-table counters.

pub mod billing;
pub mod document;
pub mod enums;
pub mod execution;
pub mod matrix;
pub mod qa;
pub mod question;

pub use billing::{NewUsageEvent, QuotaReservation, Subscription, UsageEvent};
pub use document::{Document, DocumentExtractionJob, DocumentIndexingJob, NewDocument};
pub use enums::{
    CellType, ChunkingStrategy, EntityRole, EntityType, ExecutionStatus, ExtractionStatus,
    JobStatus, MatrixCellStatus, MatrixType, QuestionType, SubscriptionStatus,
    SubscriptionTier, UsageEventType,
};
pub use execution::{
    ExecutionManifest, ExecutionMetadata, GeneratedFile, WorkflowExecution,
};
pub use matrix::{
    CellEntityRef, EntitySet, EntitySetMember, Matrix, MatrixCell, MatrixTemplateVariable,
    NewEntitySet, NewMatrix, QuestionTemplateVariable,
};
pub use qa::{Answer, AnswerData, AnswerSet, Citation, CitationSet, QaJob};
pub use question::{NewQuestion, Question};
