//! # Cellgrid Matrix
//!
//! Entity sets, cell strategies, batch processing, and QA scheduling.
//!
//! ## Components
//!
//! - [`entity_sets`] — entity set and member management
//! - [`signature`] — stable cell signatures over `(role, member)` pairs
//! - [`strategies`] — standard and cross-correlation fan-out behind a
//!   tagged variant
//! - [`batch`] — transactional bulk cell/job creation and broker publish
//! - [`qa`] — QA job service, routing policy, and the locking worker
//! - [`answers`] — answer set persistence
//! - [`templates`] — `#{{id}}` and `@{{ROLE}}` placeholder resolution
//! - [`reprocess`] — filtered re-enqueueing of existing cells

pub mod answers;
pub mod batch;
pub mod entity_sets;
pub mod error;
pub mod qa;
pub mod reprocess;
pub mod signature;
pub mod strategies;
pub mod templates;

pub use answers::AnswerService;
pub use batch::BatchProcessingService;
pub use entity_sets::{EntitySetService, EntitySetSnapshot};
pub use error::{MatrixError, MatrixResult};
pub use qa::{AgentQaLauncher, AgentQaRequest, QaJobService, QaWorker};
pub use reprocess::{EntitySetFilter, ReprocessRequest, ReprocessingService};
pub use strategies::{CellSpec, CellStrategy, StrategyContext, StrategyInput};
pub use templates::TemplateService;
