//! In-memory relational store backing the cellgrid engine.
//!
//! One `Store` value holds every table behind a single `tokio::sync::RwLock`.
//! Multi-row mutations (batch cell creation, answer-set persistence) take the
//! write guard once, so the whole batch commits or fails atomically. Unique
//! predicates are checked inside the guard:
//!
//! - `matrix_cells(matrix_id, cell_signature)` unique where not deleted
//! - `documents(company_id, checksum)` unique where not deleted
//! - `subscriptions(company_id)` unique
//! - `matrix_entity_set_members(entity_set_id, entity_type, entity_id)`
//!   unique where not deleted
//!
//! Rows are mutated by their owning service only; cross-service reads are
//! fine. Every query method is tenant-scoped by `company_id`.

mod billing_ops;
mod document_ops;
mod matrix_ops;
mod qa_ops;
mod template_ops;

pub use matrix_ops::{BatchInsertResult, CellSpecInsert, RefInsert};
pub use qa_ops::{AnswerInsert, CitationInsert};

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{
    Answer, AnswerSet, CellEntityRef, Citation, CitationSet, Document,
    DocumentExtractionJob, DocumentIndexingJob, EntitySet, EntitySetMember, Matrix,
    MatrixCell, MatrixTemplateVariable, QaJob, Question, QuestionTemplateVariable,
    Subscription, UsageEvent, WorkflowExecution,
};

/// Per-table auto-increment id allocation, starting at 1.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    fn next_id(&mut self) -> i64 {
        self.next += 1;
        self.next
    }
}

/// A single table: rows keyed by id, id order is creation order.
#[derive(Debug)]
pub(crate) struct Table<T> {
    rows: BTreeMap<i64, T>,
    ids: IdAllocator,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            ids: IdAllocator::default(),
        }
    }
}

impl<T> Table<T> {
    /// Insert a row built from a freshly allocated id, returning the id.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> i64 {
        let id = self.ids.next_id();
        self.rows.insert(id, build(id));
        id
    }

    pub(crate) fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    /// Iterate rows in id (creation) order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.rows.values_mut()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) matrices: Table<Matrix>,
    pub(crate) entity_sets: Table<EntitySet>,
    pub(crate) members: Table<EntitySetMember>,
    pub(crate) cells: Table<MatrixCell>,
    pub(crate) cell_refs: Table<CellEntityRef>,
    pub(crate) answer_sets: Table<AnswerSet>,
    pub(crate) answers: Table<Answer>,
    pub(crate) citation_sets: Table<CitationSet>,
    pub(crate) citations: Table<Citation>,
    pub(crate) qa_jobs: Table<QaJob>,
    pub(crate) documents: Table<Document>,
    pub(crate) extraction_jobs: Table<DocumentExtractionJob>,
    pub(crate) indexing_jobs: Table<DocumentIndexingJob>,
    pub(crate) subscriptions: Table<Subscription>,
    pub(crate) usage_events: Table<UsageEvent>,
    pub(crate) template_variables: Table<MatrixTemplateVariable>,
    pub(crate) question_template_variables: Table<QuestionTemplateVariable>,
    pub(crate) questions: Table<Question>,
    pub(crate) executions: Table<WorkflowExecution>,
}

/// The relational store. Cheap to clone via `Arc`.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}
