//! Entity set and member management.

use std::sync::Arc;

use tracing::info;

use cellgrid_core::model::{EntitySet, EntitySetMember, EntityType, NewEntitySet};
use cellgrid_core::store::Store;

use crate::error::MatrixResult;

/// An entity set together with its non-deleted members, ordered by
/// `member_order`. The unit strategies consume.
#[derive(Debug, Clone)]
pub struct EntitySetSnapshot {
    pub set: EntitySet,
    pub members: Vec<EntitySetMember>,
}

/// CRUD over entity sets and their members.
#[derive(Clone)]
pub struct EntitySetService {
    store: Arc<Store>,
}

impl EntitySetService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn create_entity_set(&self, new: NewEntitySet) -> EntitySet {
        let set = self.store.insert_entity_set(new).await;
        info!(entity_set_id = set.id, matrix_id = set.matrix_id, "created entity set");
        set
    }

    /// Add members in `[0, n)` order, deduplicating against existing
    /// non-deleted members by `(entity_set_id, entity_type, entity_id)`.
    /// Returns only the members actually created, so a retry after a racing
    /// duplicate insertion is idempotent.
    pub async fn add_members_batch(
        &self,
        entity_set_id: i64,
        company_id: i64,
        entity_type: EntityType,
        entity_ids: &[i64],
    ) -> MatrixResult<Vec<EntitySetMember>> {
        let created = self
            .store
            .insert_members_batch(entity_set_id, company_id, entity_type, entity_ids)
            .await?;
        info!(
            entity_set_id,
            requested = entity_ids.len(),
            created = created.len(),
            "added entity set members"
        );
        Ok(created)
    }

    /// All non-deleted entity sets of a matrix, in creation order.
    pub async fn get_matrix_entity_sets(
        &self,
        matrix_id: i64,
        company_id: i64,
    ) -> Vec<EntitySet> {
        self.store.entity_sets_for_matrix(matrix_id, company_id).await
    }

    /// Entity sets with their members, the strategy input.
    pub async fn snapshot(&self, matrix_id: i64, company_id: i64) -> Vec<EntitySetSnapshot> {
        let sets = self.get_matrix_entity_sets(matrix_id, company_id).await;
        let mut snapshots = Vec::with_capacity(sets.len());
        for set in sets {
            let members = self.store.members_of_set(set.id).await;
            snapshots.push(EntitySetSnapshot { set, members });
        }
        snapshots
    }
}
