//! QA worker: consumes job messages and drives cells to completion.
//!
//! The per-cell distributed lock — not the broker — is the correctness
//! primitive. Losing the lock race, finding the cell missing, or finding it
//! already completed are all acknowledged outcomes, not errors; only a
//! processing failure propagates so the broker can redeliver or
//! dead-letter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use cellgrid_core::config::LockConfig;
use cellgrid_core::error::CoreResult;
use cellgrid_core::lock::DistributedLock;
use cellgrid_core::metrics::EngineMetrics;
use cellgrid_core::model::{JobStatus, MatrixCellStatus, MatrixType, QuestionType};
use cellgrid_core::queue::QaJobMessage;
use cellgrid_core::store::Store;

use crate::answers::AnswerService;
use crate::error::MatrixResult;
use crate::strategies::{CellStrategy, StrategyContext};

use super::job_service::QaJobService;
use super::routing::QaRouting;

const LOCK_LOST_MESSAGE: &str = "Cell being processed by another worker";
const CELL_COMPLETED_MESSAGE: &str = "Cell already completed";
const CELL_MISSING_MESSAGE: &str = "Matrix cell not found";

/// Input handed to the agent QA workflow when a cell routes to the agent.
#[derive(Debug, Clone)]
pub struct AgentQaRequest {
    pub job_id: i64,
    pub matrix_cell_id: i64,
    pub document_ids: Vec<i64>,
    pub question_text: String,
    pub matrix_type: MatrixType,
    pub question_type: QuestionType,
    pub question_id: i64,
    pub company_id: i64,
    pub min_answers: i32,
    pub max_answers: i32,
}

impl AgentQaRequest {
    /// Deterministic workflow id: one agent run per (job, cell) pair.
    pub fn workflow_id(&self) -> String {
        format!("agent-qa-{}-{}", self.job_id, self.matrix_cell_id)
    }
}

/// Seam to the durable workflow engine; the worker only starts the
/// workflow, it never awaits it.
#[async_trait]
pub trait AgentQaLauncher: Send + Sync {
    async fn launch(&self, request: AgentQaRequest) -> CoreResult<()>;
}

/// Launcher for deployments without agent QA; every launch fails loudly.
pub struct NoAgentQa;

#[async_trait]
impl AgentQaLauncher for NoAgentQa {
    async fn launch(&self, request: AgentQaRequest) -> CoreResult<()> {
        Err(cellgrid_core::error::CoreError::Internal(format!(
            "agent QA not configured (workflow {})",
            request.workflow_id()
        )))
    }
}

/// Worker that processes QA job messages.
pub struct QaWorker {
    store: Arc<Store>,
    lock: Arc<dyn DistributedLock>,
    jobs: QaJobService,
    answers: AnswerService,
    routing: QaRouting,
    ctx: StrategyContext,
    agent_qa: Arc<dyn AgentQaLauncher>,
    lock_config: LockConfig,
    metrics: EngineMetrics,
}

impl QaWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        lock: Arc<dyn DistributedLock>,
        jobs: QaJobService,
        ctx: StrategyContext,
        agent_qa: Arc<dyn AgentQaLauncher>,
        lock_config: LockConfig,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            answers: AnswerService::new(store.clone()),
            store,
            lock,
            jobs,
            routing: QaRouting::new(),
            ctx,
            agent_qa,
            lock_config,
            metrics,
        }
    }

    /// Process one message to an acknowledged outcome. Err means the
    /// failure was recorded on the job and cell and the message should be
    /// redelivered or dead-lettered by the broker.
    pub async fn process_message(&self, message: &QaJobMessage) -> MatrixResult<()> {
        let job_id = message.job_id;
        let cell_id = message.matrix_cell_id;
        info!(job_id, cell_id, "QA worker received message");

        let Some(job) = self.store.get_qa_job(job_id).await else {
            warn!(job_id, "QA job not found, acknowledging");
            return Ok(());
        };
        let company_id = job.company_id;

        // At most one worker per cell at any instant.
        let lock_key = format!("matrix_cell:{cell_id}");
        let ttl = Duration::from_secs(self.lock_config.qa_cell_ttl_secs);
        let Some(token) = self.lock.acquire(&lock_key, ttl).await else {
            info!(cell_id, "could not acquire lock, another worker is processing");
            self.metrics.lock_contention_total.inc();
            self.jobs
                .update_job_status(
                    job_id,
                    JobStatus::Completed,
                    Some(LOCK_LOST_MESSAGE.to_string()),
                    Some(Utc::now()),
                )
                .await?;
            return Ok(());
        };

        let outcome = self.process_locked(job_id, cell_id, company_id).await;

        // Always release the lock, whatever happened above.
        self.lock.release(&lock_key, &token).await;

        if let Err(e) = &outcome {
            error!(job_id, cell_id, error = %e, "error processing QA job");
            self.record_failure(job_id, cell_id, company_id, &e.to_string())
                .await;
            self.metrics
                .qa_jobs_processed_total
                .with_label_values(&["failed"])
                .inc();
        } else {
            self.metrics
                .qa_jobs_processed_total
                .with_label_values(&["completed"])
                .inc();
        }
        outcome
    }

    async fn process_locked(
        &self,
        job_id: i64,
        cell_id: i64,
        company_id: i64,
    ) -> MatrixResult<()> {
        let Some(cell) = self.store.get_cell(cell_id, company_id).await else {
            warn!(cell_id, "matrix cell not found");
            self.jobs
                .update_job_status(
                    job_id,
                    JobStatus::Failed,
                    Some(CELL_MISSING_MESSAGE.to_string()),
                    None,
                )
                .await?;
            return Ok(());
        };

        if cell.status == MatrixCellStatus::Completed {
            info!(cell_id, "cell already completed, collapsing duplicate job");
            self.jobs
                .update_job_status(
                    job_id,
                    JobStatus::Completed,
                    Some(CELL_COMPLETED_MESSAGE.to_string()),
                    Some(Utc::now()),
                )
                .await?;
            return Ok(());
        }

        let matrix = self
            .store
            .get_matrix(cell.matrix_id, company_id)
            .await
            .ok_or_else(|| cellgrid_core::error::CoreError::not_found("matrix", cell.matrix_id))?;
        let strategy = CellStrategy::for_matrix_type(matrix.matrix_type);

        let cell_data = strategy.load_cell_data(&self.ctx, cell_id, company_id).await?;
        let question = self
            .store
            .get_question(cell_data.question.question_id, company_id)
            .await
            .ok_or_else(|| {
                cellgrid_core::error::CoreError::not_found(
                    "question",
                    cell_data.question.question_id,
                )
            })?;

        if self.routing.should_use_agent_qa(question.use_agent_qa) {
            // Durability moves to the workflow; the job is done here.
            let request = AgentQaRequest {
                job_id,
                matrix_cell_id: cell_id,
                document_ids: cell_data.documents.iter().map(|d| d.document_id).collect(),
                question_text: question.question_text.clone(),
                matrix_type: matrix.matrix_type,
                question_type: question.question_type,
                question_id: question.id,
                company_id,
                min_answers: question.min_answers,
                max_answers: question.max_answers,
            };
            info!(workflow_id = %request.workflow_id(), "routing cell to agent QA workflow");
            self.agent_qa.launch(request).await?;
            self.jobs
                .update_job_status(job_id, JobStatus::Completed, None, Some(Utc::now()))
                .await?;
            return Ok(());
        }

        let (answer_set, question_type) = strategy
            .process_cell_to_completion(&self.ctx, cell_id, company_id)
            .await?;
        info!(
            cell_id,
            answers = answer_set.answer_count(),
            answer_found = answer_set.answer_found(),
            "creating answer set from AI response"
        );
        self.answers
            .create_answer_set_from_ai(cell_id, company_id, question_type, &answer_set, true)
            .await?;
        self.store
            .update_cell_status(cell_id, company_id, MatrixCellStatus::Completed)
            .await?;
        self.jobs
            .update_job_status(job_id, JobStatus::Completed, None, Some(Utc::now()))
            .await?;
        info!(job_id, "successfully completed QA job");
        Ok(())
    }

    /// Best-effort failure bookkeeping; update errors are logged, never
    /// propagated over the original failure.
    async fn record_failure(&self, job_id: i64, cell_id: i64, company_id: i64, message: &str) {
        if let Err(e) = self
            .jobs
            .update_job_status(job_id, JobStatus::Failed, Some(message.to_string()), None)
            .await
        {
            error!(job_id, error = %e, "failed to update job status after error");
        }
        if let Err(e) = self
            .store
            .update_cell_status(cell_id, company_id, MatrixCellStatus::Failed)
            .await
        {
            error!(cell_id, error = %e, "failed to update cell status after error");
        }
    }
}
