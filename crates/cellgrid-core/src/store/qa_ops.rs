//! QA job and answer persistence operations.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Answer, AnswerData, AnswerSet, Citation, CitationSet, JobStatus, QaJob, QuestionType,
};

use super::Store;

/// One answer to persist, with its ordered citations.
#[derive(Debug, Clone)]
pub struct AnswerInsert {
    pub data: AnswerData,
    pub citations: Vec<CitationInsert>,
}

/// One citation of an answer; order is the position in the vector.
#[derive(Debug, Clone)]
pub struct CitationInsert {
    pub document_id: i64,
    pub quote_text: String,
}

impl Store {
    pub async fn insert_qa_job(&self, cell_id: i64, company_id: i64) -> QaJob {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.qa_jobs.insert_with(|id| QaJob {
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
        tables.qa_jobs.get(id).cloned().expect("row just inserted")
    }

    pub async fn get_qa_job(&self, job_id: i64) -> Option<QaJob> {
        let tables = self.tables.read().await;
        tables.qa_jobs.get(job_id).cloned()
    }

    pub async fn qa_jobs_for_cell(&self, cell_id: i64) -> Vec<QaJob> {
        let tables = self.tables.read().await;
        tables
            .qa_jobs
            .iter()
            .filter(|j| j.matrix_cell_id == cell_id)
            .cloned()
            .collect()
    }

    pub async fn update_qa_job_status(
        &self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> CoreResult<QaJob> {
        let mut tables = self.tables.write().await;
        let job = tables
            .qa_jobs
            .get_mut(job_id)
            .ok_or_else(|| CoreError::not_found("qa job", job_id))?;
        job.status = status;
        if error_message.is_some() {
            job.error_message = error_message;
        }
        if completed_at.is_some() {
            job.completed_at = completed_at;
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Persist an answer set with its answers, citation sets, and citations
    /// in one transaction, optionally moving the cell's current pointer.
    ///
    /// `confidence` is computed by the caller; `answer_found` is derived
    /// from the answer count.
    pub async fn insert_answer_set(
        &self,
        cell_id: i64,
        company_id: i64,
        question_type: QuestionType,
        answers: Vec<AnswerInsert>,
        confidence: f64,
        set_as_current: bool,
    ) -> CoreResult<AnswerSet> {
        let mut tables = self.tables.write().await;
        // The cell must exist before anything is written.
        tables
            .cells
            .get(cell_id)
            .filter(|c| c.company_id == company_id && !c.deleted)
            .ok_or_else(|| CoreError::not_found("matrix cell", cell_id))?;

        let now = Utc::now();
        let set_id = tables.answer_sets.insert_with(|id| AnswerSet {
            id,
            matrix_cell_id: cell_id,
            company_id,
            question_type,
            answer_found: !answers.is_empty(),
            confidence,
            created_at: now,
        });

        for insert in answers {
            let answer_id = tables.answers.insert_with(|id| Answer {
                id,
                answer_set_id: set_id,
                company_id,
                answer_data: insert.data.clone(),
                current_citation_set_id: None,
                created_at: now,
            });
            let citation_set_id = tables.citation_sets.insert_with(|id| CitationSet {
                id,
                answer_id,
                company_id,
                created_at: now,
            });
            for (order, citation) in insert.citations.iter().enumerate() {
                tables.citations.insert_with(|id| Citation {
                    id,
                    citation_set_id,
                    company_id,
                    document_id: citation.document_id,
                    citation_order: order as i32,
                    quote_text: citation.quote_text.clone(),
                    created_at: now,
                });
            }
            tables
                .answers
                .get_mut(answer_id)
                .expect("row just inserted")
                .current_citation_set_id = Some(citation_set_id);
        }

        if set_as_current {
            let cell = tables.cells.get_mut(cell_id).expect("checked above");
            cell.current_answer_set_id = Some(set_id);
            cell.updated_at = now;
        }

        Ok(tables.answer_sets.get(set_id).cloned().expect("row just inserted"))
    }

    pub async fn get_answer_set(&self, answer_set_id: i64) -> Option<AnswerSet> {
        let tables = self.tables.read().await;
        tables.answer_sets.get(answer_set_id).cloned()
    }

    pub async fn answers_for_set(&self, answer_set_id: i64) -> Vec<Answer> {
        let tables = self.tables.read().await;
        tables
            .answers
            .iter()
            .filter(|a| a.answer_set_id == answer_set_id)
            .cloned()
            .collect()
    }

    /// Citations of a citation set, ordered by `citation_order`.
    pub async fn citations_for_set(&self, citation_set_id: i64) -> Vec<Citation> {
        let tables = self.tables.read().await;
        let mut citations: Vec<_> = tables
            .citations
            .iter()
            .filter(|c| c.citation_set_id == citation_set_id)
            .cloned()
            .collect();
        citations.sort_by_key(|c| c.citation_order);
        citations
    }
}
