//! Batch processing: transactional bulk creation of cells and QA jobs,
//! followed by batched publication to the broker.
//!
//! The unique signature predicate is the correctness fence; the service
//! holds no cross-row locks. A signature conflict is "already created",
//! never a batch failure.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use cellgrid_core::billing::UsageService;
use cellgrid_core::error::CoreError;
use cellgrid_core::metrics::EngineMetrics;
use cellgrid_core::model::{JobStatus, MatrixCell, QaJob};
use cellgrid_core::queue::{queue_names, MessageQueue, QaJobMessage};
use cellgrid_core::store::{CellSpecInsert, RefInsert, Store};

use crate::entity_sets::EntitySetService;
use crate::error::MatrixResult;
use crate::strategies::{CellSpec, CellStrategy, StrategyInput};

const PUBLISH_FAILURE_MESSAGE: &str = "Failed to queue job";

/// Applies cell strategies, writes cells and jobs transactionally, and
/// enqueues broker messages.
#[derive(Clone)]
pub struct BatchProcessingService {
    store: Arc<Store>,
    queue: Arc<dyn MessageQueue>,
    entity_sets: EntitySetService,
    usage: UsageService,
    metrics: EngineMetrics,
}

impl BatchProcessingService {
    pub fn new(store: Arc<Store>, queue: Arc<dyn MessageQueue>, metrics: EngineMetrics) -> Self {
        Self {
            entity_sets: EntitySetService::new(store.clone()),
            usage: UsageService::new(store.clone()),
            store,
            queue,
            metrics,
        }
    }

    /// Expand a membership change into cells (and optionally QUEUED jobs),
    /// then publish the job messages in one batch.
    pub async fn process_entity_added_to_set(
        &self,
        matrix_id: i64,
        company_id: i64,
        entity_id: i64,
        entity_set_id: i64,
        create_qa_jobs: bool,
    ) -> MatrixResult<(Vec<MatrixCell>, Vec<QaJob>)> {
        let matrix = self
            .store
            .get_matrix(matrix_id, company_id)
            .await
            .ok_or_else(|| CoreError::not_found("matrix", matrix_id))?;

        let snapshot = self.entity_sets.snapshot(matrix_id, company_id).await;
        let strategy = CellStrategy::for_matrix_type(matrix.matrix_type);
        let specs = strategy.specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id,
            new_entity_id: entity_id,
        })?;

        // Drop specs whose signature already exists as a non-deleted cell.
        let existing = self.store.cell_signatures_for_matrix(matrix_id).await;
        let fresh: Vec<CellSpec> = specs
            .into_iter()
            .filter(|spec| !existing.contains(&spec.signature()))
            .collect();
        if fresh.is_empty() {
            info!(matrix_id, entity_id, "no new cells to create");
            return Ok((Vec::new(), Vec::new()));
        }

        let (cells, jobs) = self.insert_and_publish(matrix_id, company_id, fresh, create_qa_jobs).await?;
        if !cells.is_empty() {
            self.usage
                .track_cell_operation(company_id, cells.len() as i64, Some(matrix_id), None)
                .await;
        }
        Ok((cells, jobs))
    }

    /// Fan out every member of the given sets, deduplicating along the way.
    /// Used by migrations and reprocessing flows that rebuild a matrix.
    pub async fn batch_create_matrix_cells_and_jobs(
        &self,
        matrix_id: i64,
        company_id: i64,
        entity_set_ids: &[i64],
        create_qa_jobs: bool,
    ) -> MatrixResult<(Vec<MatrixCell>, Vec<QaJob>)> {
        let mut all_cells = Vec::new();
        let mut all_jobs = Vec::new();
        for &entity_set_id in entity_set_ids {
            let members = self.store.members_of_set(entity_set_id).await;
            for member in members {
                let (cells, jobs) = self
                    .process_entity_added_to_set(
                        matrix_id,
                        company_id,
                        member.entity_id,
                        entity_set_id,
                        create_qa_jobs,
                    )
                    .await?;
                all_cells.extend(cells);
                all_jobs.extend(jobs);
            }
        }
        Ok((all_cells, all_jobs))
    }

    /// Create QUEUED jobs for existing cells and publish them in one batch.
    /// Returns the number of jobs created.
    pub async fn create_jobs_and_queue_for_cells(
        &self,
        cells: &[MatrixCell],
    ) -> MatrixResult<usize> {
        if cells.is_empty() {
            return Ok(0);
        }
        let mut jobs = Vec::with_capacity(cells.len());
        for cell in cells {
            jobs.push(self.store.insert_qa_job(cell.id, cell.company_id).await);
        }
        self.publish_jobs(&jobs).await;
        Ok(jobs.len())
    }

    async fn insert_and_publish(
        &self,
        matrix_id: i64,
        company_id: i64,
        specs: Vec<CellSpec>,
        create_qa_jobs: bool,
    ) -> MatrixResult<(Vec<MatrixCell>, Vec<QaJob>)> {
        let inserts: Vec<CellSpecInsert> = specs
            .iter()
            .map(|spec| CellSpecInsert {
                cell_type: spec.cell_type,
                cell_signature: spec.signature(),
                refs: spec
                    .refs
                    .iter()
                    .map(|r| RefInsert {
                        entity_set_id: r.entity_set_id,
                        entity_set_member_id: r.entity_set_member_id,
                        role: r.role,
                        entity_order: r.entity_order,
                    })
                    .collect(),
            })
            .collect();

        let result = self
            .store
            .insert_cells_batch(matrix_id, company_id, inserts, create_qa_jobs)
            .await;
        self.metrics
            .cells_created_total
            .inc_by(result.cells.len() as u64);
        info!(
            matrix_id,
            cells = result.cells.len(),
            jobs = result.jobs.len(),
            "batch created matrix cells"
        );

        let mut jobs = result.jobs;
        if !jobs.is_empty() {
            jobs = self.publish_jobs(&jobs).await;
        }
        Ok((result.cells, jobs))
    }

    /// Publish messages for jobs in one batch. A publish failure downgrades
    /// every affected job to FAILED; the cells stay PENDING for the
    /// reprocessing service to pick up.
    async fn publish_jobs(&self, jobs: &[QaJob]) -> Vec<QaJob> {
        let messages: Vec<serde_json::Value> = jobs
            .iter()
            .map(|job| {
                serde_json::to_value(QaJobMessage {
                    job_id: job.id,
                    matrix_cell_id: job.matrix_cell_id,
                })
                .expect("message serializes")
            })
            .collect();

        let publish = async {
            self.queue.declare_queue(queue_names::QA_WORKER).await?;
            self.queue
                .publish_batch(queue_names::QA_WORKER, messages)
                .await
        };
        match publish.await {
            Ok(()) => {
                info!(count = jobs.len(), "published QA job batch");
                jobs.to_vec()
            }
            Err(e) => {
                error!(error = %e, count = jobs.len(), "failed to publish QA jobs");
                let mut failed = Vec::with_capacity(jobs.len());
                for job in jobs {
                    match self
                        .store
                        .update_qa_job_status(
                            job.id,
                            JobStatus::Failed,
                            Some(PUBLISH_FAILURE_MESSAGE.to_string()),
                            Some(Utc::now()),
                        )
                        .await
                    {
                        Ok(updated) => failed.push(updated),
                        Err(update_error) => {
                            error!(job_id = job.id, error = %update_error, "failed to mark job failed");
                            failed.push(job.clone());
                        }
                    }
                }
                failed
            }
        }
    }
}
