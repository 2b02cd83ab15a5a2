//! Cell strategies: the fan-out rules that decide which cells must exist.
//!
//! A strategy is a pure function of (entity-set state, new entity) → cell
//! specs. The variants mirror the matrix types; dynamic dispatch is a tagged
//! enum behind a narrow interface, not a class hierarchy.

mod correlation;
mod standard;

pub use correlation::CrossCorrelationStrategy;
pub use standard::StandardStrategy;

use std::sync::Arc;

use tracing::debug;

use cellgrid_core::ai::{AiAnswerSet, AiProvider, DocumentContext, QaPrompt};
use cellgrid_core::model::{
    CellEntityRef, CellType, EntityRole, EntityType, MatrixType, QuestionType,
};
use cellgrid_core::storage::{extracted_markdown_key, ObjectStorage};
use cellgrid_core::store::Store;

use crate::entity_sets::EntitySetSnapshot;
use crate::error::{MatrixError, MatrixResult};
use crate::signature::cell_signature;
use crate::templates::TemplateService;

/// One entity reference of a prospective cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    pub entity_set_id: i64,
    pub entity_set_member_id: i64,
    pub entity_id: i64,
    pub role: EntityRole,
    pub entity_order: i32,
}

/// A cell that a strategy says must exist.
#[derive(Debug, Clone)]
pub struct CellSpec {
    pub cell_type: CellType,
    pub refs: Vec<RefSpec>,
}

impl CellSpec {
    /// Dedup signature over the spec's `(role, member)` pairs.
    pub fn signature(&self) -> String {
        let pairs: Vec<(EntityRole, i64)> = self
            .refs
            .iter()
            .map(|r| (r.role, r.entity_set_member_id))
            .collect();
        cell_signature(&pairs)
    }

    /// Reference with the given role, if present.
    pub fn ref_with_role(&self, role: EntityRole) -> Option<&RefSpec> {
        self.refs.iter().find(|r| r.role == role)
    }
}

/// Input to `specs_for_new_entity`: the matrix's loaded entity-set state
/// plus the entity whose membership changed.
#[derive(Debug)]
pub struct StrategyInput<'a> {
    pub sets: &'a [EntitySetSnapshot],
    /// Set the entity was added to (already containing it).
    pub entity_set_id: i64,
    pub new_entity_id: i64,
}

impl<'a> StrategyInput<'a> {
    fn set_by_id(&self, entity_set_id: i64) -> Option<&'a EntitySetSnapshot> {
        self.sets.iter().find(|s| s.set.id == entity_set_id)
    }

    fn first_set_of_type(&self, entity_type: EntityType) -> Option<&'a EntitySetSnapshot> {
        self.sets.iter().find(|s| s.set.entity_type == entity_type)
    }
}

/// A document participating in a cell, with the axis it occupies.
#[derive(Debug, Clone)]
pub struct CellDocument {
    pub document_id: i64,
    pub role: EntityRole,
}

/// The question a cell asks.
#[derive(Debug, Clone)]
pub struct CellQuestion {
    pub question_id: i64,
}

/// Everything the QA worker needs to process one cell.
#[derive(Debug, Clone)]
pub struct CellData {
    pub documents: Vec<CellDocument>,
    pub question: CellQuestion,
    pub refs: Vec<CellEntityRef>,
}

/// Shared dependencies for the processing half of a strategy.
#[derive(Clone)]
pub struct StrategyContext {
    pub store: Arc<Store>,
    pub object_storage: Arc<dyn ObjectStorage>,
    pub ai: Arc<dyn AiProvider>,
    pub templates: TemplateService,
}

/// Tagged strategy variant selected by the matrix type.
#[derive(Debug, Clone, Copy)]
pub enum CellStrategy {
    Standard(StandardStrategy),
    Correlation(CrossCorrelationStrategy),
}

impl CellStrategy {
    pub fn for_matrix_type(matrix_type: MatrixType) -> Self {
        match matrix_type {
            MatrixType::Standard => Self::Standard(StandardStrategy),
            MatrixType::Correlation => Self::Correlation(CrossCorrelationStrategy),
        }
    }

    /// Cells that must exist after `new_entity_id` joined `entity_set_id`.
    /// Pure and deterministic: identical inputs yield identical specs.
    pub fn specs_for_new_entity(&self, input: &StrategyInput<'_>) -> MatrixResult<Vec<CellSpec>> {
        match self {
            Self::Standard(s) => s.specs_for_new_entity(input),
            Self::Correlation(s) => s.specs_for_new_entity(input),
        }
    }

    /// Load the documents, question, and refs of a cell, validating the
    /// ref arity for the cell type.
    pub async fn load_cell_data(
        &self,
        ctx: &StrategyContext,
        cell_id: i64,
        company_id: i64,
    ) -> MatrixResult<CellData> {
        let refs = ctx.store.refs_for_cell(cell_id).await;
        let expected = match self {
            Self::Standard(_) => 2,
            Self::Correlation(_) => 3,
        };
        if refs.len() != expected {
            return Err(MatrixError::MalformedCell {
                cell_id,
                reason: format!("expected {expected} entity refs, found {}", refs.len()),
            });
        }

        let mut documents = Vec::new();
        let mut question = None;
        for r in &refs {
            let member = ctx.store.get_member(r.entity_set_member_id).await.ok_or_else(
                || MatrixError::MalformedCell {
                    cell_id,
                    reason: format!("entity set member {} missing", r.entity_set_member_id),
                },
            )?;
            if member.company_id != company_id {
                return Err(MatrixError::MalformedCell {
                    cell_id,
                    reason: format!("member {} belongs to another tenant", member.id),
                });
            }
            match r.role {
                EntityRole::Question => question = Some(CellQuestion {
                    question_id: member.entity_id,
                }),
                role => documents.push(CellDocument {
                    document_id: member.entity_id,
                    role,
                }),
            }
        }
        let question = question.ok_or_else(|| MatrixError::MalformedCell {
            cell_id,
            reason: "no question ref".into(),
        })?;
        Ok(CellData {
            documents,
            question,
            refs,
        })
    }

    /// Build the prompt for a cell, run QA, and return the provider's
    /// answers with the question type. Persistence is the caller's job.
    pub async fn process_cell_to_completion(
        &self,
        ctx: &StrategyContext,
        cell_id: i64,
        company_id: i64,
    ) -> MatrixResult<(AiAnswerSet, QuestionType)> {
        let cell_data = self.load_cell_data(ctx, cell_id, company_id).await?;
        let question = ctx
            .store
            .get_question(cell_data.question.question_id, company_id)
            .await
            .ok_or_else(|| {
                cellgrid_core::error::CoreError::not_found(
                    "question",
                    cell_data.question.question_id,
                )
            })?;

        // Resolve #{{id}} variables, then @{{ROLE}} placeholders.
        let resolved = ctx
            .templates
            .resolve_template_variables(&question.question_text, question.matrix_id)
            .await;
        let resolved = ctx
            .templates
            .resolve_document_placeholders(&resolved, &cell_data.documents);

        let mut contexts = Vec::with_capacity(cell_data.documents.len());
        for doc in &cell_data.documents {
            let key = extracted_markdown_key(company_id, doc.document_id);
            let content = ctx
                .object_storage
                .download(&key)
                .await?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            contexts.push(DocumentContext {
                document_id: doc.document_id,
                content,
            });
        }

        debug!(cell_id, question_id = question.id, "running QA for cell");
        let prompt = QaPrompt {
            question_text: resolved,
            question_type: question.question_type,
            documents: contexts,
            min_answers: question.min_answers,
            max_answers: question.max_answers,
        };
        let answers = ctx.ai.answer_question(&prompt).await?;
        Ok((answers, question.question_type))
    }
}
