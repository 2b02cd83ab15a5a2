//! Matrix, entity set, member, cell, and entity reference operations.

use std::collections::HashSet;

use chrono::Utc;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    CellEntityRef, CellType, EntityRole, EntitySet, EntitySetMember, EntityType, JobStatus,
    Matrix, MatrixCell, MatrixCellStatus, NewEntitySet, NewMatrix, QaJob,
};

use super::Store;

/// One cell to insert, together with its entity references.
#[derive(Debug, Clone)]
pub struct CellSpecInsert {
    pub cell_type: CellType,
    pub cell_signature: String,
    pub refs: Vec<RefInsert>,
}

/// One entity reference of a cell spec.
#[derive(Debug, Clone)]
pub struct RefInsert {
    pub entity_set_id: i64,
    pub entity_set_member_id: i64,
    pub role: EntityRole,
    pub entity_order: i32,
}

/// Rows created by a transactional batch insert.
#[derive(Debug, Default)]
pub struct BatchInsertResult {
    pub cells: Vec<MatrixCell>,
    pub jobs: Vec<QaJob>,
}

impl Store {
    pub async fn insert_matrix(&self, new: NewMatrix) -> Matrix {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.matrices.insert_with(|id| Matrix {
            id,
            workspace_id: new.workspace_id,
            company_id: new.company_id,
            name: new.name.clone(),
            description: new.description.clone(),
            matrix_type: new.matrix_type,
            deleted: false,
            created_at: now,
            updated_at: now,
        });
        tables.matrices.get(id).cloned().expect("row just inserted")
    }

    pub async fn get_matrix(&self, matrix_id: i64, company_id: i64) -> Option<Matrix> {
        let tables = self.tables.read().await;
        tables
            .matrices
            .get(matrix_id)
            .filter(|m| m.company_id == company_id && !m.deleted)
            .cloned()
    }

    /// Soft-delete a matrix; entity sets and cells are logically cascaded
    /// because every query filters on the matrix being live.
    pub async fn soft_delete_matrix(&self, matrix_id: i64, company_id: i64) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let matrix = tables
            .matrices
            .get_mut(matrix_id)
            .filter(|m| m.company_id == company_id && !m.deleted)
            .ok_or_else(|| CoreError::not_found("matrix", matrix_id))?;
        matrix.deleted = true;
        matrix.updated_at = Utc::now();
        Ok(())
    }

    pub async fn insert_entity_set(&self, new: NewEntitySet) -> EntitySet {
        let mut tables = self.tables.write().await;
        let id = tables.entity_sets.insert_with(|id| EntitySet {
            id,
            matrix_id: new.matrix_id,
            company_id: new.company_id,
            name: new.name.clone(),
            entity_type: new.entity_type,
            deleted: false,
            created_at: Utc::now(),
        });
        tables.entity_sets.get(id).cloned().expect("row just inserted")
    }

    pub async fn get_entity_set(&self, entity_set_id: i64, company_id: i64) -> Option<EntitySet> {
        let tables = self.tables.read().await;
        tables
            .entity_sets
            .get(entity_set_id)
            .filter(|s| s.company_id == company_id && !s.deleted)
            .cloned()
    }

    /// Non-deleted entity sets of a matrix, in creation order.
    pub async fn entity_sets_for_matrix(
        &self,
        matrix_id: i64,
        company_id: i64,
    ) -> Vec<EntitySet> {
        let tables = self.tables.read().await;
        tables
            .entity_sets
            .iter()
            .filter(|s| s.matrix_id == matrix_id && s.company_id == company_id && !s.deleted)
            .cloned()
            .collect()
    }

    /// Batch-insert members, skipping `(set, entity_type, entity_id)` pairs
    /// that already exist non-deleted. Orders new members after the current
    /// maximum. Returns only the rows actually created.
    pub async fn insert_members_batch(
        &self,
        entity_set_id: i64,
        company_id: i64,
        entity_type: EntityType,
        entity_ids: &[i64],
    ) -> CoreResult<Vec<EntitySetMember>> {
        let mut tables = self.tables.write().await;
        let set = tables
            .entity_sets
            .get(entity_set_id)
            .filter(|s| s.company_id == company_id && !s.deleted)
            .ok_or_else(|| CoreError::not_found("entity set", entity_set_id))?;
        if set.entity_type != entity_type {
            return Err(CoreError::validation(format!(
                "entity type {entity_type} does not match set {}",
                set.entity_type
            )));
        }

        let existing: HashSet<i64> = tables
            .members
            .iter()
            .filter(|m| {
                m.entity_set_id == entity_set_id && m.entity_type == entity_type && !m.deleted
            })
            .map(|m| m.entity_id)
            .collect();
        let mut next_order = tables
            .members
            .iter()
            .filter(|m| m.entity_set_id == entity_set_id && !m.deleted)
            .map(|m| m.member_order + 1)
            .max()
            .unwrap_or(0);

        let mut created = Vec::new();
        for &entity_id in entity_ids {
            if existing.contains(&entity_id) {
                debug!(entity_set_id, entity_id, "member already present, skipping");
                continue;
            }
            let id = tables.members.insert_with(|id| EntitySetMember {
                id,
                entity_set_id,
                company_id,
                entity_type,
                entity_id,
                member_order: next_order,
                label: None,
                deleted: false,
                created_at: Utc::now(),
            });
            next_order += 1;
            created.push(tables.members.get(id).cloned().expect("row just inserted"));
        }
        Ok(created)
    }

    /// Non-deleted members of a set, ordered by `member_order`.
    pub async fn members_of_set(&self, entity_set_id: i64) -> Vec<EntitySetMember> {
        let tables = self.tables.read().await;
        let mut members: Vec<_> = tables
            .members
            .iter()
            .filter(|m| m.entity_set_id == entity_set_id && !m.deleted)
            .cloned()
            .collect();
        members.sort_by_key(|m| (m.member_order, m.id));
        members
    }

    pub async fn get_member(&self, member_id: i64) -> Option<EntitySetMember> {
        let tables = self.tables.read().await;
        tables.members.get(member_id).filter(|m| !m.deleted).cloned()
    }

    pub async fn set_member_label(
        &self,
        member_id: i64,
        company_id: i64,
        label: Option<String>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let member = tables
            .members
            .get_mut(member_id)
            .filter(|m| m.company_id == company_id && !m.deleted)
            .ok_or_else(|| CoreError::not_found("entity set member", member_id))?;
        member.label = label;
        Ok(())
    }

    /// Signatures of all non-deleted cells in a matrix (the dedup fence).
    pub async fn cell_signatures_for_matrix(&self, matrix_id: i64) -> HashSet<String> {
        let tables = self.tables.read().await;
        tables
            .cells
            .iter()
            .filter(|c| c.matrix_id == matrix_id && !c.deleted)
            .map(|c| c.cell_signature.clone())
            .collect()
    }

    /// Transactionally insert cells, their refs, and (optionally) QUEUED QA
    /// jobs. A spec whose signature already exists non-deleted in the matrix
    /// is skipped: a signature conflict means "already created", never a
    /// batch failure.
    pub async fn insert_cells_batch(
        &self,
        matrix_id: i64,
        company_id: i64,
        specs: Vec<CellSpecInsert>,
        create_qa_jobs: bool,
    ) -> BatchInsertResult {
        let mut tables = self.tables.write().await;
        let mut seen: HashSet<String> = tables
            .cells
            .iter()
            .filter(|c| c.matrix_id == matrix_id && !c.deleted)
            .map(|c| c.cell_signature.clone())
            .collect();

        let now = Utc::now();
        let mut result = BatchInsertResult::default();
        for spec in specs {
            if !seen.insert(spec.cell_signature.clone()) {
                debug!(matrix_id, signature = %spec.cell_signature, "duplicate cell signature, skipping");
                continue;
            }
            let cell_id = tables.cells.insert_with(|id| MatrixCell {
                id,
                matrix_id,
                company_id,
                status: MatrixCellStatus::Pending,
                cell_type: spec.cell_type,
                current_answer_set_id: None,
                cell_signature: spec.cell_signature.clone(),
                deleted: false,
                created_at: now,
                updated_at: now,
            });
            for r in &spec.refs {
                tables.cell_refs.insert_with(|id| CellEntityRef {
                    id,
                    matrix_id,
                    matrix_cell_id: cell_id,
                    entity_set_id: r.entity_set_id,
                    entity_set_member_id: r.entity_set_member_id,
                    company_id,
                    role: r.role,
                    entity_order: r.entity_order,
                    deleted: false,
                    created_at: now,
                });
            }
            if create_qa_jobs {
                let job_id = tables.qa_jobs.insert_with(|id| QaJob {
                    id,
                    matrix_cell_id: cell_id,
                    company_id,
                    status: JobStatus::Queued,
                    worker_message_id: None,
                    error_message: None,
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                });
                result
                    .jobs
                    .push(tables.qa_jobs.get(job_id).cloned().expect("row just inserted"));
            }
            result
                .cells
                .push(tables.cells.get(cell_id).cloned().expect("row just inserted"));
        }
        result
    }

    pub async fn get_cell(&self, cell_id: i64, company_id: i64) -> Option<MatrixCell> {
        let tables = self.tables.read().await;
        tables
            .cells
            .get(cell_id)
            .filter(|c| c.company_id == company_id && !c.deleted)
            .cloned()
    }

    /// Non-deleted cells of a matrix, in creation order.
    pub async fn cells_for_matrix(&self, matrix_id: i64, company_id: i64) -> Vec<MatrixCell> {
        let tables = self.tables.read().await;
        tables
            .cells
            .iter()
            .filter(|c| c.matrix_id == matrix_id && c.company_id == company_id && !c.deleted)
            .cloned()
            .collect()
    }

    pub async fn update_cell_status(
        &self,
        cell_id: i64,
        company_id: i64,
        status: MatrixCellStatus,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let cell = tables
            .cells
            .get_mut(cell_id)
            .filter(|c| c.company_id == company_id && !c.deleted)
            .ok_or_else(|| CoreError::not_found("matrix cell", cell_id))?;
        cell.status = status;
        cell.updated_at = Utc::now();
        Ok(())
    }

    /// Non-deleted refs of a cell, ordered by `entity_order`.
    pub async fn refs_for_cell(&self, cell_id: i64) -> Vec<CellEntityRef> {
        let tables = self.tables.read().await;
        let mut refs: Vec<_> = tables
            .cell_refs
            .iter()
            .filter(|r| r.matrix_cell_id == cell_id && !r.deleted)
            .cloned()
            .collect();
        refs.sort_by_key(|r| (r.entity_order, r.id));
        refs
    }

    /// Non-deleted refs of every cell in a matrix, for filter evaluation.
    pub async fn refs_for_matrix(&self, matrix_id: i64) -> Vec<CellEntityRef> {
        let tables = self.tables.read().await;
        tables
            .cell_refs
            .iter()
            .filter(|r| r.matrix_id == matrix_id && !r.deleted)
            .cloned()
            .collect()
    }
}
