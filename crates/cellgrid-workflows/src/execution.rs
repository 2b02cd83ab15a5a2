//! Code/agent workflow executions.
//!
//! Workflow id `workflow-execution-{execution_id}`: launch the agent job,
//! poll its status, extract results from the manifest in object storage,
//! update the execution record, and clean up. Cleanup is best-effort and
//! never changes the workflow outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use cellgrid_core::billing::{QuotaService, UsageService};
use cellgrid_core::error::{CoreError, CoreResult};
use cellgrid_core::model::{ExecutionManifest, ExecutionStatus, WorkflowExecution};
use cellgrid_core::storage::{execution_manifest_key, ObjectStorage};
use cellgrid_core::store::Store;

use crate::engine::{poll_until, task_queues, ConflictPolicy, WorkflowEngine};
use crate::error::WorkflowResult;

/// Phase of a launched agent job as seen by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Running,
    Finished,
}

/// Contract with the agent job backend (launch, poll, cleanup).
#[async_trait]
pub trait AgentJobRunner: Send + Sync {
    /// Launch the job for an execution; returns an opaque job reference.
    async fn launch(&self, execution: &WorkflowExecution) -> CoreResult<String>;

    async fn poll(&self, job_ref: &str) -> CoreResult<JobPhase>;

    /// Tear down the agent and its service account.
    async fn cleanup(&self, job_ref: &str) -> CoreResult<()>;
}

/// Starts and drives workflow executions.
#[derive(Clone)]
pub struct ExecutionService {
    store: Arc<Store>,
    object_storage: Arc<dyn ObjectStorage>,
    quota: QuotaService,
    usage: UsageService,
    runner: Arc<dyn AgentJobRunner>,
    engine: Arc<WorkflowEngine>,
    poll_ceiling: Duration,
}

impl ExecutionService {
    pub fn new(
        store: Arc<Store>,
        object_storage: Arc<dyn ObjectStorage>,
        quota: QuotaService,
        runner: Arc<dyn AgentJobRunner>,
        engine: Arc<WorkflowEngine>,
    ) -> Self {
        Self {
            usage: UsageService::new(store.clone()),
            store,
            object_storage,
            quota,
            runner,
            engine,
            poll_ceiling: Duration::from_secs(600),
        }
    }

    pub fn workflow_id(execution_id: i64) -> String {
        format!("workflow-execution-{execution_id}")
    }

    /// Create an execution record and start its workflow. The tenant's
    /// workflow quota gates the launch; the run is metered once started.
    pub async fn start_execution(
        &self,
        workflow_id: i64,
        company_id: i64,
    ) -> WorkflowResult<WorkflowExecution> {
        self.quota.check_workflow_quota(company_id).await?;
        let execution = self.store.insert_execution(workflow_id, company_id).await;
        self.usage
            .track_workflow(company_id, Some(workflow_id), None)
            .await;

        let service = self.clone();
        let execution_id = execution.id;
        self.engine.start(
            &Self::workflow_id(execution_id),
            task_queues::WORKFLOW_EXECUTION,
            ConflictPolicy::UseExisting,
            async move { service.run(execution_id, company_id).await },
        )?;
        Ok(execution)
    }

    async fn run(self, execution_id: i64, company_id: i64) -> WorkflowResult<()> {
        let result = self.run_inner(execution_id, company_id).await;
        if let Err(e) = &result {
            let message = e.status_message();
            error!(execution_id, error = %message, "execution workflow failed");
            let _ = self
                .store
                .update_execution_status(execution_id, ExecutionStatus::Failed, Some(message))
                .await;
        }
        result
    }

    async fn run_inner(&self, execution_id: i64, company_id: i64) -> WorkflowResult<()> {
        let execution = self
            .store
            .get_execution(execution_id, company_id)
            .await
            .ok_or_else(|| CoreError::not_found("workflow execution", execution_id))?;
        self.store
            .update_execution_status(execution_id, ExecutionStatus::Running, None)
            .await?;

        let job_ref = self.runner.launch(&execution).await?;
        info!(execution_id, %job_ref, "launched agent job");

        let finished = poll_until(self.poll_ceiling, Duration::from_millis(250), || {
            let job_ref = job_ref.clone();
            async move {
                match self.runner.poll(&job_ref).await? {
                    JobPhase::Finished => Ok(Some(())),
                    JobPhase::Running => Ok(None),
                }
            }
        })
        .await?;
        if finished.is_none() {
            self.cleanup_best_effort(&job_ref).await;
            return Err(CoreError::Storage(format!(
                "agent job {job_ref} did not finish within {}s",
                self.poll_ceiling.as_secs()
            ))
            .into());
        }

        // Results come from the manifest the agent wrote next to its
        // outputs.
        let manifest_key =
            execution_manifest_key(company_id, execution.workflow_id, execution_id);
        let manifest_bytes = self
            .object_storage
            .download(&manifest_key)
            .await?
            .ok_or_else(|| {
                CoreError::Storage(format!("manifest {manifest_key} missing"))
            })?;
        let manifest: ExecutionManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(CoreError::from)?;

        self.store
            .record_execution_results(execution_id, manifest.output_files, manifest.metadata)
            .await?;

        self.cleanup_best_effort(&job_ref).await;
        info!(execution_id, "execution workflow finished");
        Ok(())
    }

    async fn cleanup_best_effort(&self, job_ref: &str) {
        if let Err(e) = self.runner.cleanup(job_ref).await {
            warn!(%job_ref, error = %e, "agent cleanup failed");
        }
    }
}
