//! Shared fixtures for matrix integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cellgrid_core::ai::StaticAiProvider;
use cellgrid_core::metrics::EngineMetrics;
use cellgrid_core::model::{
    EntitySet, EntitySetMember, EntityType, Matrix, MatrixType, NewEntitySet, NewMatrix,
    NewQuestion, Question, QuestionType,
};
use cellgrid_core::queue::MemoryQueue;
use cellgrid_core::storage::MemoryObjectStore;
use cellgrid_core::store::Store;
use cellgrid_matrix::batch::BatchProcessingService;
use cellgrid_matrix::entity_sets::EntitySetService;
use cellgrid_matrix::strategies::StrategyContext;
use cellgrid_matrix::templates::TemplateService;

pub const COMPANY_ID: i64 = 100;

pub struct Harness {
    pub store: Arc<Store>,
    pub queue: Arc<MemoryQueue>,
    pub object_storage: Arc<MemoryObjectStore>,
    pub ai: Arc<StaticAiProvider>,
    pub entity_sets: EntitySetService,
    pub batch: BatchProcessingService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Store::new();
        let queue = Arc::new(MemoryQueue::new());
        let batch = BatchProcessingService::new(
            store.clone(),
            queue.clone(),
            EngineMetrics::unregistered(),
        );
        Self {
            entity_sets: EntitySetService::new(store.clone()),
            object_storage: Arc::new(MemoryObjectStore::new()),
            ai: Arc::new(StaticAiProvider::new()),
            store,
            queue,
            batch,
        }
    }

    pub fn strategy_context(&self) -> StrategyContext {
        StrategyContext {
            store: self.store.clone(),
            object_storage: self.object_storage.clone(),
            ai: self.ai.clone(),
            templates: TemplateService::new(self.store.clone()),
        }
    }

    pub async fn create_matrix(&self, matrix_type: MatrixType) -> Matrix {
        self.store
            .insert_matrix(NewMatrix {
                workspace_id: 1,
                company_id: COMPANY_ID,
                name: "Test Matrix".into(),
                description: None,
                matrix_type,
            })
            .await
    }

    pub async fn create_set(&self, matrix: &Matrix, entity_type: EntityType) -> EntitySet {
        let name = match entity_type {
            EntityType::Document => "Documents",
            EntityType::Question => "Questions",
        };
        self.entity_sets
            .create_entity_set(NewEntitySet {
                matrix_id: matrix.id,
                company_id: COMPANY_ID,
                name: name.into(),
                entity_type,
            })
            .await
    }

    pub async fn add_members(
        &self,
        set: &EntitySet,
        entity_ids: &[i64],
    ) -> Vec<EntitySetMember> {
        self.entity_sets
            .add_members_batch(set.id, COMPANY_ID, set.entity_type, entity_ids)
            .await
            .unwrap()
    }

    pub async fn create_question(
        &self,
        matrix: &Matrix,
        text: &str,
        use_agent_qa: bool,
    ) -> Question {
        self.store
            .insert_question(NewQuestion {
                matrix_id: matrix.id,
                company_id: COMPANY_ID,
                question_text: text.into(),
                question_type: QuestionType::Text,
                use_agent_qa,
                min_answers: 1,
                max_answers: 3,
            })
            .await
    }
}
