//! Answer set persistence.

use std::sync::Arc;

use tracing::info;

use cellgrid_core::ai::AiAnswerSet;
use cellgrid_core::model::{Answer, AnswerSet, Citation, QuestionType};
use cellgrid_core::store::{AnswerInsert, CitationInsert, Store};

use crate::error::MatrixResult;

/// An answer with its ordered citations, as read back for callers.
#[derive(Debug, Clone)]
pub struct AnswerWithCitations {
    pub answer: Answer,
    pub citations: Vec<Citation>,
}

/// An answer set with its fully hydrated children.
#[derive(Debug, Clone)]
pub struct AnswerSetDetail {
    pub answer_set: AnswerSet,
    pub answers: Vec<AnswerWithCitations>,
}

/// Persists AI answer sets and reads them back with citations.
#[derive(Clone)]
pub struct AnswerService {
    store: Arc<Store>,
}

impl AnswerService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist a provider answer set for a cell in one transaction:
    /// answer set, answers, citation sets, ordered citations, and current
    /// pointers. Confidence is the mean over per-answer confidences, 0.0
    /// for an empty set.
    pub async fn create_answer_set_from_ai(
        &self,
        cell_id: i64,
        company_id: i64,
        question_type: QuestionType,
        ai_set: &AiAnswerSet,
        set_as_current: bool,
    ) -> MatrixResult<AnswerSet> {
        let confidence = if ai_set.answers.is_empty() {
            0.0
        } else {
            ai_set.answers.iter().map(|a| a.confidence).sum::<f64>()
                / ai_set.answers.len() as f64
        };

        let inserts: Vec<AnswerInsert> = ai_set
            .answers
            .iter()
            .map(|a| AnswerInsert {
                data: a.data.clone(),
                citations: a
                    .citations
                    .iter()
                    .map(|c| CitationInsert {
                        document_id: c.document_id,
                        quote_text: c.quote_text.clone(),
                    })
                    .collect(),
            })
            .collect();

        let answer_set = self
            .store
            .insert_answer_set(cell_id, company_id, question_type, inserts, confidence, set_as_current)
            .await?;
        info!(
            answer_set_id = answer_set.id,
            cell_id,
            answers = ai_set.answer_count(),
            answer_found = answer_set.answer_found,
            "persisted answer set"
        );
        Ok(answer_set)
    }

    /// Read an answer set with its answers and each answer's current
    /// citations.
    pub async fn answer_set_detail(&self, answer_set_id: i64) -> Option<AnswerSetDetail> {
        let answer_set = self.store.get_answer_set(answer_set_id).await?;
        let mut answers = Vec::new();
        for answer in self.store.answers_for_set(answer_set_id).await {
            let citations = match answer.current_citation_set_id {
                Some(citation_set_id) => self.store.citations_for_set(citation_set_id).await,
                None => Vec::new(),
            };
            answers.push(AnswerWithCitations { answer, citations });
        }
        Some(AnswerSetDetail {
            answer_set,
            answers,
        })
    }
}
