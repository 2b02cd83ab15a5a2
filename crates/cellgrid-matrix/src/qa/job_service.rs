//! QA job lifecycle and queueing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use cellgrid_core::error::CoreError;
use cellgrid_core::model::{JobStatus, MatrixCellStatus, QaJob};
use cellgrid_core::queue::{queue_names, MessageQueue, QaJobMessage};
use cellgrid_core::store::Store;

use crate::error::MatrixResult;

const PUBLISH_FAILURE_MESSAGE: &str = "Failed to queue job";

/// Creates, queues, and transitions QA jobs. Multiple jobs per cell are
/// allowed; duplicates collapse in the worker via the lock and the
/// already-completed short-circuit.
#[derive(Clone)]
pub struct QaJobService {
    store: Arc<Store>,
    queue: Arc<dyn MessageQueue>,
}

impl QaJobService {
    pub fn new(store: Arc<Store>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { store, queue }
    }

    /// Create a QUEUED job for a cell and publish its message. A publish
    /// failure downgrades the job to FAILED and leaves the cell PENDING.
    pub async fn create_and_queue_job(
        &self,
        cell_id: i64,
        company_id: i64,
    ) -> MatrixResult<QaJob> {
        let job = self.store.insert_qa_job(cell_id, company_id).await;
        let message = serde_json::to_value(QaJobMessage {
            job_id: job.id,
            matrix_cell_id: cell_id,
        })
        .map_err(CoreError::from)?;

        let publish = async {
            self.queue.declare_queue(queue_names::QA_WORKER).await?;
            self.queue.publish(queue_names::QA_WORKER, message).await
        };
        match publish.await {
            Ok(()) => {
                info!(job_id = job.id, cell_id, "queued QA job");
                Ok(job)
            }
            Err(e) => {
                error!(job_id = job.id, error = %e, "failed to publish QA job");
                let failed = self
                    .store
                    .update_qa_job_status(
                        job.id,
                        JobStatus::Failed,
                        Some(PUBLISH_FAILURE_MESSAGE.to_string()),
                        Some(Utc::now()),
                    )
                    .await?;
                Ok(failed)
            }
        }
    }

    pub async fn update_job_status(
        &self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> MatrixResult<QaJob> {
        Ok(self
            .store
            .update_qa_job_status(job_id, status, error_message, completed_at)
            .await?)
    }

    pub async fn get_job(&self, job_id: i64) -> Option<QaJob> {
        self.store.get_qa_job(job_id).await
    }

    /// Create and queue a job for every PENDING cell of a matrix. Returns
    /// the number of jobs created.
    pub async fn queue_pending_cells(
        &self,
        matrix_id: i64,
        company_id: i64,
    ) -> MatrixResult<usize> {
        let pending: Vec<_> = self
            .store
            .cells_for_matrix(matrix_id, company_id)
            .await
            .into_iter()
            .filter(|c| c.status == MatrixCellStatus::Pending)
            .collect();
        for cell in &pending {
            self.create_and_queue_job(cell.id, company_id).await?;
        }
        info!(matrix_id, count = pending.len(), "queued pending cells");
        Ok(pending.len())
    }
}
