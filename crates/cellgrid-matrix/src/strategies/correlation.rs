//! Cross-correlation strategy: ordered document pairs × questions.

use cellgrid_core::model::{CellType, EntityRole, EntityType, EntitySetMember};

use crate::error::{MatrixError, MatrixResult};

use super::{CellSpec, RefSpec, StrategyInput};

/// Fan-out for CORRELATION matrices.
///
/// Adding a document `e` to documents `D` emits, for every `d ∈ D\{e}` and
/// question `q`, the two ordered cells `(e, d, q)` and `(d, e, q)` — never a
/// self-pair. Adding a question emits every ordered pair `(d_i, d_j)`,
/// `i ≠ j`, with the new question. Refs are ordered LEFT, RIGHT, QUESTION.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossCorrelationStrategy;

impl CrossCorrelationStrategy {
    pub fn specs_for_new_entity(&self, input: &StrategyInput<'_>) -> MatrixResult<Vec<CellSpec>> {
        let changed = input
            .set_by_id(input.entity_set_id)
            .ok_or_else(|| MatrixError::strategy(format!(
                "entity set {} not in snapshot",
                input.entity_set_id
            )))?;

        match changed.set.entity_type {
            EntityType::Document => self.specs_for_new_document(input, changed.set.id),
            EntityType::Question => self.specs_for_new_question(input, changed.set.id),
        }
    }

    fn specs_for_new_document(
        &self,
        input: &StrategyInput<'_>,
        document_set_id: i64,
    ) -> MatrixResult<Vec<CellSpec>> {
        let documents = input
            .set_by_id(document_set_id)
            .expect("changed set is in snapshot");
        let new_doc = documents
            .members
            .iter()
            .find(|m| m.entity_id == input.new_entity_id)
            .ok_or_else(|| MatrixError::strategy(format!(
                "document {} is not a member of set {document_set_id}",
                input.new_entity_id
            )))?;
        let Some(questions) = input.first_set_of_type(EntityType::Question) else {
            return Ok(Vec::new());
        };

        let mut specs = Vec::new();
        for other in &documents.members {
            if other.entity_id == new_doc.entity_id {
                continue;
            }
            for question in &questions.members {
                specs.push(correlation_spec(
                    document_set_id,
                    new_doc,
                    other,
                    questions.set.id,
                    question,
                ));
                specs.push(correlation_spec(
                    document_set_id,
                    other,
                    new_doc,
                    questions.set.id,
                    question,
                ));
            }
        }
        Ok(specs)
    }

    fn specs_for_new_question(
        &self,
        input: &StrategyInput<'_>,
        question_set_id: i64,
    ) -> MatrixResult<Vec<CellSpec>> {
        let questions = input
            .set_by_id(question_set_id)
            .expect("changed set is in snapshot");
        let new_question = questions
            .members
            .iter()
            .find(|m| m.entity_id == input.new_entity_id)
            .ok_or_else(|| MatrixError::strategy(format!(
                "question {} is not a member of set {question_set_id}",
                input.new_entity_id
            )))?;
        let Some(documents) = input.first_set_of_type(EntityType::Document) else {
            return Ok(Vec::new());
        };

        let mut specs = Vec::new();
        for left in &documents.members {
            for right in &documents.members {
                if left.entity_id == right.entity_id {
                    continue;
                }
                specs.push(correlation_spec(
                    documents.set.id,
                    left,
                    right,
                    question_set_id,
                    new_question,
                ));
            }
        }
        Ok(specs)
    }
}

fn correlation_spec(
    document_set_id: i64,
    left: &EntitySetMember,
    right: &EntitySetMember,
    question_set_id: i64,
    question: &EntitySetMember,
) -> CellSpec {
    CellSpec {
        cell_type: CellType::Correlation,
        refs: vec![
            RefSpec {
                entity_set_id: document_set_id,
                entity_set_member_id: left.id,
                entity_id: left.entity_id,
                role: EntityRole::Left,
                entity_order: 0,
            },
            RefSpec {
                entity_set_id: document_set_id,
                entity_set_member_id: right.id,
                entity_id: right.entity_id,
                role: EntityRole::Right,
                entity_order: 1,
            },
            RefSpec {
                entity_set_id: question_set_id,
                entity_set_member_id: question.id,
                entity_id: question.entity_id,
                role: EntityRole::Question,
                entity_order: 2,
            },
        ],
    }
}
