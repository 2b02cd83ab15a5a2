//! Standard grid strategy: one cell per (document, question) pair.

use cellgrid_core::model::{CellType, EntityRole, EntityType};

use crate::error::{MatrixError, MatrixResult};

use super::{CellSpec, RefSpec, StrategyInput};

/// Fan-out for STANDARD matrices.
///
/// Adding a document pairs it with every non-deleted question; adding a
/// question pairs it with every non-deleted document. Refs are ordered
/// DOCUMENT then QUESTION.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStrategy;

impl StandardStrategy {
    pub fn specs_for_new_entity(&self, input: &StrategyInput<'_>) -> MatrixResult<Vec<CellSpec>> {
        let changed = input
            .set_by_id(input.entity_set_id)
            .ok_or_else(|| MatrixError::strategy(format!(
                "entity set {} not in snapshot",
                input.entity_set_id
            )))?;
        let new_member = changed
            .members
            .iter()
            .find(|m| m.entity_id == input.new_entity_id)
            .ok_or_else(|| MatrixError::strategy(format!(
                "entity {} is not a member of set {}",
                input.new_entity_id, input.entity_set_id
            )))?;

        let counterpart_type = match changed.set.entity_type {
            EntityType::Document => EntityType::Question,
            EntityType::Question => EntityType::Document,
        };
        let Some(counterpart) = input.first_set_of_type(counterpart_type) else {
            return Ok(Vec::new());
        };

        let mut specs = Vec::with_capacity(counterpart.members.len());
        for other in &counterpart.members {
            let (document, question) = match changed.set.entity_type {
                EntityType::Document => (
                    (changed.set.id, new_member),
                    (counterpart.set.id, other),
                ),
                EntityType::Question => (
                    (counterpart.set.id, other),
                    (changed.set.id, new_member),
                ),
            };
            specs.push(CellSpec {
                cell_type: CellType::Standard,
                refs: vec![
                    RefSpec {
                        entity_set_id: document.0,
                        entity_set_member_id: document.1.id,
                        entity_id: document.1.entity_id,
                        role: EntityRole::Document,
                        entity_order: 0,
                    },
                    RefSpec {
                        entity_set_id: question.0,
                        entity_set_member_id: question.1.id,
                        entity_id: question.1.entity_id,
                        role: EntityRole::Question,
                        entity_order: 1,
                    },
                ],
            });
        }
        Ok(specs)
    }
}
