//! Matrix, entity set, cell, and entity reference rows.
//!
//! A cell's coordinate is its multiset of `(role, entity_set_member_id)`
//! pairs; `document_id`/`question_id` columns do not exist. The role field
//! on a reference IS the axis identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{CellType, EntityRole, EntityType, MatrixCellStatus, MatrixType};

/// A named container of entity sets and cells inside a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matrix {
    pub id: i64,
    pub workspace_id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub matrix_type: MatrixType,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a matrix.
#[derive(Debug, Clone)]
pub struct NewMatrix {
    pub workspace_id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub matrix_type: MatrixType,
}

/// Named, ordered collection of entities of one kind within a matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySet {
    pub id: i64,
    pub matrix_id: i64,
    pub company_id: i64,
    pub name: String,
    pub entity_type: EntityType,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating an entity set.
#[derive(Debug, Clone)]
pub struct NewEntitySet {
    pub matrix_id: i64,
    pub company_id: i64,
    pub name: String,
    pub entity_type: EntityType,
}

/// Membership of an entity in an entity set.
///
/// The same `entity_id` may appear in multiple sets; a correlation matrix
/// reuses one document set under two roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySetMember {
    pub id: i64,
    pub entity_set_id: i64,
    pub company_id: i64,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub member_order: i32,
    /// Optional display label; never consulted by placeholder resolution.
    pub label: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// One coordinate of the matrix, identified by its signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixCell {
    pub id: i64,
    pub matrix_id: i64,
    pub company_id: i64,
    pub status: MatrixCellStatus,
    pub cell_type: CellType,
    pub current_answer_set_id: Option<i64>,
    /// Hex digest over sorted `(role, member_id)` pairs; the dedup key.
    pub cell_signature: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One dimension of a cell's coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEntityRef {
    pub id: i64,
    pub matrix_id: i64,
    pub matrix_cell_id: i64,
    pub entity_set_id: i64,
    pub entity_set_member_id: i64,
    pub company_id: i64,
    pub role: EntityRole,
    pub entity_order: i32,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Template variable scoped to a matrix, referenced as `#{{<id>}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixTemplateVariable {
    pub id: i64,
    pub matrix_id: i64,
    pub company_id: i64,
    pub template_string: String,
    pub value: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Association between a question and a template variable it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTemplateVariable {
    pub id: i64,
    pub question_id: i64,
    pub template_variable_id: i64,
    pub company_id: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}
