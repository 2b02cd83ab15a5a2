//! QA job service, routing policy, and worker.

mod job_service;
mod routing;
mod worker;

pub use job_service::QaJobService;
pub use routing::QaRouting;
pub use worker::{AgentQaLauncher, AgentQaRequest, NoAgentQa, QaWorker};
