//! QA worker state machine tests: locking, short-circuits, both branches.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cellgrid_core::ai::{AiAnswer, AiAnswerSet, AiCitation, StaticAiProvider};
use cellgrid_core::config::LockConfig;
use cellgrid_core::error::CoreResult;
use cellgrid_core::lock::{DistributedLock, MemoryLock};
use cellgrid_core::metrics::EngineMetrics;
use cellgrid_core::model::{
    AnswerData, EntityType, JobStatus, MatrixCellStatus, MatrixType,
};
use cellgrid_core::queue::QaJobMessage;
use cellgrid_matrix::qa::{AgentQaLauncher, AgentQaRequest, QaJobService, QaWorker};

use common::{Harness, COMPANY_ID};

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<AgentQaRequest>>,
}

#[async_trait]
impl AgentQaLauncher for RecordingLauncher {
    async fn launch(&self, request: AgentQaRequest) -> CoreResult<()> {
        self.launched.lock().await.push(request);
        Ok(())
    }
}

struct WorkerFixture {
    harness: Harness,
    lock: Arc<MemoryLock>,
    launcher: Arc<RecordingLauncher>,
    worker: QaWorker,
}

fn build_worker(harness: Harness) -> WorkerFixture {
    let lock = Arc::new(MemoryLock::new());
    let launcher = Arc::new(RecordingLauncher::default());
    let worker = QaWorker::new(
        harness.store.clone(),
        lock.clone(),
        QaJobService::new(harness.store.clone(), harness.queue.clone()),
        harness.strategy_context(),
        launcher.clone(),
        LockConfig::default(),
        EngineMetrics::unregistered(),
    );
    WorkerFixture {
        harness,
        lock,
        launcher,
        worker,
    }
}

/// One standard cell wired to a real question row, with a queued job.
async fn seed_standard_cell(
    harness: &Harness,
    question_text: &str,
    use_agent_qa: bool,
) -> (i64, i64) {
    let matrix = harness.create_matrix(MatrixType::Standard).await;
    let doc_set = harness.create_set(&matrix, EntityType::Document).await;
    let question_set = harness.create_set(&matrix, EntityType::Question).await;
    let question = harness.create_question(&matrix, question_text, use_agent_qa).await;
    harness.add_members(&doc_set, &[501]).await;
    harness.add_members(&question_set, &[question.id]).await;

    let (cells, jobs) = harness
        .batch
        .process_entity_added_to_set(matrix.id, COMPANY_ID, 501, doc_set.id, true)
        .await
        .unwrap();
    (jobs[0].id, cells[0].id)
}

#[tokio::test]
async fn test_sync_path_completes_cell_and_persists_answers() {
    let harness = Harness::new();
    harness
        .ai
        .script_answer(
            "What is the governing law?",
            AiAnswerSet {
                answers: vec![AiAnswer {
                    data: AnswerData::Text {
                        value: "Delaware".into(),
                    },
                    confidence: 0.8,
                    citations: vec![AiCitation {
                        document_id: 501,
                        quote_text: "governed by Delaware law".into(),
                    }],
                }],
            },
        )
        .await;
    let fixture = build_worker(harness);
    let (job_id, cell_id) = seed_standard_cell(
        &fixture.harness,
        "What is the governing law?",
        false,
    )
    .await;

    fixture
        .worker
        .process_message(&QaJobMessage {
            job_id,
            matrix_cell_id: cell_id,
        })
        .await
        .unwrap();

    let cell = fixture
        .harness
        .store
        .get_cell(cell_id, COMPANY_ID)
        .await
        .unwrap();
    assert_eq!(cell.status, MatrixCellStatus::Completed);
    let answer_set_id = cell.current_answer_set_id.unwrap();
    let answer_set = fixture
        .harness
        .store
        .get_answer_set(answer_set_id)
        .await
        .unwrap();
    assert!(answer_set.answer_found);
    assert_eq!(answer_set.confidence, 0.8);

    let job = fixture.harness.store.get_qa_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());

    // The lock is released after processing.
    assert!(!fixture.lock.is_locked(&format!("matrix_cell:{cell_id}")).await);
}

#[tokio::test]
async fn test_lock_collision_completes_job_with_note() {
    // S4: the loser of the lock race acknowledges with a note and the
    // winner's state is untouched.
    let fixture = build_worker(Harness::new());
    let (job_id, cell_id) = seed_standard_cell(&fixture.harness, "q", false).await;

    let held = fixture
        .lock
        .acquire(&format!("matrix_cell:{cell_id}"), Duration::from_secs(300))
        .await
        .unwrap();

    fixture
        .worker
        .process_message(&QaJobMessage {
            job_id,
            matrix_cell_id: cell_id,
        })
        .await
        .unwrap();

    let job = fixture.harness.store.get_qa_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("Cell being processed by another worker")
    );
    // The cell was never touched.
    let cell = fixture
        .harness
        .store
        .get_cell(cell_id, COMPANY_ID)
        .await
        .unwrap();
    assert_eq!(cell.status, MatrixCellStatus::Pending);
    // The other worker's token is still valid.
    assert!(fixture
        .lock
        .release(&format!("matrix_cell:{cell_id}"), &held)
        .await);
}

#[tokio::test]
async fn test_already_completed_cell_collapses_duplicate_job() {
    let fixture = build_worker(Harness::new());
    let (_, cell_id) = seed_standard_cell(&fixture.harness, "q", false).await;
    fixture
        .harness
        .store
        .update_cell_status(cell_id, COMPANY_ID, MatrixCellStatus::Completed)
        .await
        .unwrap();

    let duplicate = fixture.harness.store.insert_qa_job(cell_id, COMPANY_ID).await;
    fixture
        .worker
        .process_message(&QaJobMessage {
            job_id: duplicate.id,
            matrix_cell_id: cell_id,
        })
        .await
        .unwrap();

    let job = fixture.harness.store.get_qa_job(duplicate.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.error_message.as_deref(), Some("Cell already completed"));
}

#[tokio::test]
async fn test_missing_cell_fails_job_and_acknowledges() {
    let fixture = build_worker(Harness::new());
    let orphan = fixture.harness.store.insert_qa_job(9999, COMPANY_ID).await;

    fixture
        .worker
        .process_message(&QaJobMessage {
            job_id: orphan.id,
            matrix_cell_id: 9999,
        })
        .await
        .unwrap();

    let job = fixture.harness.store.get_qa_job(orphan.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("Matrix cell not found"));
}

#[tokio::test]
async fn test_agent_branch_launches_workflow_and_completes_job() {
    let fixture = build_worker(Harness::new());
    let (job_id, cell_id) =
        seed_standard_cell(&fixture.harness, "agent question", true).await;

    fixture
        .worker
        .process_message(&QaJobMessage {
            job_id,
            matrix_cell_id: cell_id,
        })
        .await
        .unwrap();

    let launched = fixture.launcher.launched.lock().await;
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].workflow_id(), format!("agent-qa-{job_id}-{cell_id}"));
    assert_eq!(launched[0].document_ids, vec![501]);
    assert_eq!(launched[0].company_id, COMPANY_ID);

    // The job is done; the workflow owns the cell from here.
    let job = fixture.harness.store.get_qa_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let cell = fixture
        .harness
        .store
        .get_cell(cell_id, COMPANY_ID)
        .await
        .unwrap();
    assert_eq!(cell.status, MatrixCellStatus::Pending);
}

#[tokio::test]
async fn test_processing_error_fails_cell_and_job_and_propagates() {
    let harness = Harness::new();
    let failing = Harness {
        ai: Arc::new(StaticAiProvider::failing()),
        ..harness
    };
    let fixture = build_worker(failing);
    let (job_id, cell_id) = seed_standard_cell(&fixture.harness, "q", false).await;

    let result = fixture
        .worker
        .process_message(&QaJobMessage {
            job_id,
            matrix_cell_id: cell_id,
        })
        .await;
    assert!(result.is_err());

    let job = fixture.harness.store.get_qa_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.is_some());
    let cell = fixture
        .harness
        .store
        .get_cell(cell_id, COMPANY_ID)
        .await
        .unwrap();
    assert_eq!(cell.status, MatrixCellStatus::Failed);

    // The lock was still released on the error path.
    assert!(!fixture.lock.is_locked(&format!("matrix_cell:{cell_id}")).await);
}
