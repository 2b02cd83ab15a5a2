//! Reprocessing: re-enqueue existing cells selected by filter.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use cellgrid_core::model::{CellEntityRef, EntityRole, MatrixCell};
use cellgrid_core::store::Store;

use crate::batch::BatchProcessingService;
use crate::error::MatrixResult;

/// One entity-set filter. A cell matches iff at least one of its refs has
/// this set, this role, and a member whose entity id is in `entity_ids`.
#[derive(Debug, Clone)]
pub struct EntitySetFilter {
    pub entity_set_id: i64,
    pub entity_ids: Vec<i64>,
    pub role: EntityRole,
}

/// Cell selection for a reprocessing run. Evaluated in order:
/// `whole_matrix`, then `cell_ids`, then `entity_set_filters` (all of which
/// must match).
#[derive(Debug, Clone, Default)]
pub struct ReprocessRequest {
    pub whole_matrix: bool,
    pub cell_ids: Vec<i64>,
    pub entity_set_filters: Vec<EntitySetFilter>,
}

impl ReprocessRequest {
    pub fn whole_matrix() -> Self {
        Self {
            whole_matrix: true,
            ..Default::default()
        }
    }

    pub fn cells(cell_ids: Vec<i64>) -> Self {
        Self {
            cell_ids,
            ..Default::default()
        }
    }

    pub fn filters(filters: Vec<EntitySetFilter>) -> Self {
        Self {
            entity_set_filters: filters,
            ..Default::default()
        }
    }
}

/// Selects cells and re-enqueues them as new QUEUED jobs.
#[derive(Clone)]
pub struct ReprocessingService {
    store: Arc<Store>,
    batch: BatchProcessingService,
}

impl ReprocessingService {
    pub fn new(store: Arc<Store>, batch: BatchProcessingService) -> Self {
        Self { store, batch }
    }

    /// Select cells per the request, create a new QA job for each, and
    /// publish the batch. Returns the number of cells re-enqueued.
    pub async fn reprocess_matrix_cells(
        &self,
        matrix_id: i64,
        company_id: i64,
        request: &ReprocessRequest,
    ) -> MatrixResult<usize> {
        let all_cells = self.store.cells_for_matrix(matrix_id, company_id).await;

        let selected: Vec<MatrixCell> = if request.whole_matrix {
            all_cells
        } else if !request.cell_ids.is_empty() {
            all_cells
                .into_iter()
                .filter(|c| request.cell_ids.contains(&c.id))
                .collect()
        } else if !request.entity_set_filters.is_empty() {
            self.filter_cells(matrix_id, all_cells, &request.entity_set_filters)
                .await
        } else {
            Vec::new()
        };

        let count = self.batch.create_jobs_and_queue_for_cells(&selected).await?;
        info!(matrix_id, count, "reprocessed matrix cells");
        Ok(count)
    }

    async fn filter_cells(
        &self,
        matrix_id: i64,
        cells: Vec<MatrixCell>,
        filters: &[EntitySetFilter],
    ) -> Vec<MatrixCell> {
        let refs = self.store.refs_for_matrix(matrix_id).await;
        let mut refs_by_cell: HashMap<i64, Vec<&CellEntityRef>> = HashMap::new();
        for r in &refs {
            refs_by_cell.entry(r.matrix_cell_id).or_default().push(r);
        }

        // Member lookups resolve ref → entity id for the filter test.
        let mut entity_by_member: HashMap<i64, i64> = HashMap::new();
        for r in &refs {
            if let Some(member) = self.store.get_member(r.entity_set_member_id).await {
                entity_by_member.insert(member.id, member.entity_id);
            }
        }

        cells
            .into_iter()
            .filter(|cell| {
                let cell_refs = refs_by_cell.get(&cell.id);
                filters.iter().all(|filter| {
                    cell_refs.is_some_and(|refs| {
                        refs.iter().any(|r| {
                            r.entity_set_id == filter.entity_set_id
                                && r.role == filter.role
                                && entity_by_member
                                    .get(&r.entity_set_member_id)
                                    .is_some_and(|entity_id| {
                                        filter.entity_ids.contains(entity_id)
                                    })
                        })
                    })
                })
            })
            .collect()
    }
}
