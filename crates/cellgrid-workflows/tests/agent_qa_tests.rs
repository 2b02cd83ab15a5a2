//! Agent QA workflow tests.

use std::sync::Arc;

use cellgrid_core::ai::{AiAnswer, AiAnswerSet, AiCitation, StaticAiProvider};
use cellgrid_core::config::SearchConfig;
use cellgrid_core::model::{
    AnswerData, CellType, MatrixCellStatus, MatrixType, NewMatrix, QuestionType,
};
use cellgrid_core::storage::MemoryObjectStore;
use cellgrid_core::store::{CellSpecInsert, Store};
use cellgrid_documents::indexing::ChunkIndexingService;
use cellgrid_documents::search::{
    Bm25KeywordIndex, ChunkSearchService, CosineVectorIndex, HashEmbedder,
};
use cellgrid_matrix::qa::{AgentQaLauncher, AgentQaRequest};
use cellgrid_workflows::agent_qa::AgentQaService;
use cellgrid_workflows::engine::WorkflowEngine;

const COMPANY_ID: i64 = 1;

struct Fixture {
    store: Arc<Store>,
    engine: Arc<WorkflowEngine>,
    ai: Arc<StaticAiProvider>,
    service: AgentQaService,
    indexing: ChunkIndexingService,
}

fn fixture() -> Fixture {
    let store = Store::new();
    let storage = Arc::new(MemoryObjectStore::new());
    let engine = WorkflowEngine::new();
    let ai = Arc::new(StaticAiProvider::new());
    let search = ChunkSearchService::new(
        Arc::new(Bm25KeywordIndex::new()),
        Arc::new(CosineVectorIndex::new()),
        Arc::new(HashEmbedder::default()),
        storage.clone(),
        SearchConfig::default(),
    );
    let indexing = ChunkIndexingService::new(search.clone(), storage);
    let service = AgentQaService::new(store.clone(), search, ai.clone(), engine.clone());
    Fixture {
        store,
        engine,
        ai,
        service,
        indexing,
    }
}

async fn seed_cell(store: &Arc<Store>) -> i64 {
    let matrix = store
        .insert_matrix(NewMatrix {
            workspace_id: 1,
            company_id: COMPANY_ID,
            name: "m".into(),
            description: None,
            matrix_type: MatrixType::Standard,
        })
        .await;
    let batch = store
        .insert_cells_batch(
            matrix.id,
            COMPANY_ID,
            vec![CellSpecInsert {
                cell_type: CellType::Standard,
                cell_signature: "agent-cell".into(),
                refs: vec![],
            }],
            false,
        )
        .await;
    batch.cells[0].id
}

fn request(cell_id: i64) -> AgentQaRequest {
    AgentQaRequest {
        job_id: 7,
        matrix_cell_id: cell_id,
        document_ids: vec![42],
        question_text: "What is the renewal term?".into(),
        matrix_type: MatrixType::Standard,
        question_type: QuestionType::Text,
        question_id: 11,
        company_id: COMPANY_ID,
        min_answers: 1,
        max_answers: 2,
    }
}

#[tokio::test]
async fn test_agent_workflow_persists_answers_and_completes_cell() {
    let f = fixture();
    let cell_id = seed_cell(&f.store).await;
    f.indexing
        .index_document_chunks(
            COMPANY_ID,
            42,
            &["The renewal term is two years.".to_string()],
        )
        .await
        .unwrap();
    f.ai.script_answer(
        "What is the renewal term?",
        AiAnswerSet {
            answers: vec![AiAnswer {
                data: AnswerData::Text {
                    value: "Two years".into(),
                },
                confidence: 0.95,
                citations: vec![AiCitation {
                    document_id: 42,
                    quote_text: "renewal term is two years".into(),
                }],
            }],
        },
    )
    .await;

    let request = request(cell_id);
    let workflow_id = request.workflow_id();
    f.service.launch(request).await.unwrap();
    f.engine.get(&workflow_id).unwrap().outcome().await.unwrap();

    let cell = f.store.get_cell(cell_id, COMPANY_ID).await.unwrap();
    assert_eq!(cell.status, MatrixCellStatus::Completed);
    let answer_set = f
        .store
        .get_answer_set(cell.current_answer_set_id.unwrap())
        .await
        .unwrap();
    assert!(answer_set.answer_found);
    assert_eq!(answer_set.question_type, QuestionType::Text);
}

#[tokio::test]
async fn test_duplicate_launch_reuses_workflow_id() {
    let f = fixture();
    let cell_id = seed_cell(&f.store).await;

    let first = request(cell_id);
    let workflow_id = first.workflow_id();
    assert_eq!(workflow_id, format!("agent-qa-7-{cell_id}"));
    f.service.launch(first).await.unwrap();
    // A second launch with the same (job, cell) resolves to the same
    // deterministic workflow id.
    f.service.launch(request(cell_id)).await.unwrap();
    f.engine.get(&workflow_id).unwrap().outcome().await.unwrap();
}

#[tokio::test]
async fn test_provider_failure_marks_cell_failed() {
    let store = Store::new();
    let storage = Arc::new(MemoryObjectStore::new());
    let engine = WorkflowEngine::new();
    let search = ChunkSearchService::new(
        Arc::new(Bm25KeywordIndex::new()),
        Arc::new(CosineVectorIndex::new()),
        Arc::new(HashEmbedder::default()),
        storage,
        SearchConfig::default(),
    );
    let service = AgentQaService::new(
        store.clone(),
        search,
        Arc::new(StaticAiProvider::failing()),
        engine.clone(),
    );
    let cell_id = seed_cell(&store).await;

    let request = request(cell_id);
    let workflow_id = request.workflow_id();
    service.launch(request).await.unwrap();
    assert!(engine.get(&workflow_id).unwrap().outcome().await.is_err());

    let cell = store.get_cell(cell_id, COMPANY_ID).await.unwrap();
    assert_eq!(cell.status, MatrixCellStatus::Failed);
}
