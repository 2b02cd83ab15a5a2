//! Agent QA workflow.
//!
//! The QA worker hands off a cell and marks its job COMPLETED immediately;
//! from that point durability lives here. The workflow gathers chunk
//! context with hybrid search, runs the provider, and persists the answer
//! set itself.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use cellgrid_core::ai::{AiProvider, DocumentContext, QaPrompt};
use cellgrid_core::error::{CoreError, CoreResult};
use cellgrid_core::model::MatrixCellStatus;
use cellgrid_core::store::Store;
use cellgrid_documents::search::{ChunkSearchFilters, ChunkSearchService};
use cellgrid_matrix::answers::AnswerService;
use cellgrid_matrix::qa::{AgentQaLauncher, AgentQaRequest};

use crate::engine::{task_queues, ConflictPolicy, WorkflowEngine};
use crate::error::WorkflowResult;

/// How many chunks of context the agent gets per cell.
const CONTEXT_CHUNK_LIMIT: usize = 12;

/// Runs agent QA workflows and implements the worker's launcher seam.
#[derive(Clone)]
pub struct AgentQaService {
    store: Arc<Store>,
    search: ChunkSearchService,
    ai: Arc<dyn AiProvider>,
    answers: AnswerService,
    engine: Arc<WorkflowEngine>,
}

impl AgentQaService {
    pub fn new(
        store: Arc<Store>,
        search: ChunkSearchService,
        ai: Arc<dyn AiProvider>,
        engine: Arc<WorkflowEngine>,
    ) -> Self {
        Self {
            answers: AnswerService::new(store.clone()),
            store,
            search,
            ai,
            engine,
        }
    }

    async fn run(self, request: AgentQaRequest) -> WorkflowResult<()> {
        let cell_id = request.matrix_cell_id;
        let company_id = request.company_id;
        info!(cell_id, question_id = request.question_id, "agent QA workflow started");

        let result = self.answer_cell(&request).await;
        match result {
            Ok(()) => {
                self.store
                    .update_cell_status(cell_id, company_id, MatrixCellStatus::Completed)
                    .await?;
                info!(cell_id, "agent QA workflow completed");
                Ok(())
            }
            Err(e) => {
                error!(cell_id, error = %e, "agent QA workflow failed");
                let _ = self
                    .store
                    .update_cell_status(cell_id, company_id, MatrixCellStatus::Failed)
                    .await;
                Err(e)
            }
        }
    }

    async fn answer_cell(&self, request: &AgentQaRequest) -> WorkflowResult<()> {
        // Hybrid-search the cell's documents for question context.
        let mut filters = ChunkSearchFilters::for_company(request.company_id);
        filters.document_ids = Some(request.document_ids.clone());
        let context = self
            .search
            .hybrid_search(
                &request.question_text,
                &filters,
                0,
                CONTEXT_CHUNK_LIMIT,
                true,
            )
            .await?;

        let documents: Vec<DocumentContext> = request
            .document_ids
            .iter()
            .map(|&document_id| DocumentContext {
                document_id,
                content: context
                    .chunks
                    .iter()
                    .filter(|c| c.document_id == document_id)
                    .filter_map(|c| c.content.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            })
            .collect();

        let prompt = QaPrompt {
            question_text: request.question_text.clone(),
            question_type: request.question_type,
            documents,
            min_answers: request.min_answers,
            max_answers: request.max_answers,
        };
        let answer_set = self.ai.answer_question(&prompt).await?;
        self.answers
            .create_answer_set_from_ai(
                request.matrix_cell_id,
                request.company_id,
                request.question_type,
                &answer_set,
                true,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AgentQaLauncher for AgentQaService {
    async fn launch(&self, request: AgentQaRequest) -> CoreResult<()> {
        let workflow_id = request.workflow_id();
        let service = self.clone();
        self.engine
            .start(
                &workflow_id,
                task_queues::AGENT_QA_WORKER,
                ConflictPolicy::UseExisting,
                async move { service.run(request).await },
            )
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        Ok(())
    }
}
