//! Answer sets, answers, citations, and QA jobs.
//!
//! Answer sets and their children are append-only; a cell's
//! `current_answer_set_id` pointer moves to the newest successful set.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{JobStatus, QuestionType};

/// Typed answer payload, discriminated by the question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerData {
    Text { value: String },
    Date { value: NaiveDate },
    Currency { amount: f64, code: String },
    Select { option_id: i64, option_value: String },
}

impl AnswerData {
    /// Question type this payload variant belongs to.
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Text { .. } => QuestionType::Text,
            Self::Date { .. } => QuestionType::Date,
            Self::Currency { .. } => QuestionType::Currency,
            Self::Select { .. } => QuestionType::Select,
        }
    }
}

/// A batch of answers produced by one QA run over a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSet {
    pub id: i64,
    pub matrix_cell_id: i64,
    pub company_id: i64,
    pub question_type: QuestionType,
    pub answer_found: bool,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// A single answer inside an answer set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub answer_set_id: i64,
    pub company_id: i64,
    pub answer_data: AnswerData,
    pub current_citation_set_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Grouping of citations supporting one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationSet {
    pub id: i64,
    pub answer_id: i64,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A quoted passage from a document supporting an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: i64,
    pub citation_set_id: i64,
    pub company_id: i64,
    pub document_id: i64,
    pub citation_order: i32,
    pub quote_text: String,
    pub created_at: DateTime<Utc>,
}

/// Durable record of a scheduling attempt for a cell.
///
/// Multiple jobs per cell are allowed; the per-cell lock prevents concurrent
/// execution, not enqueuing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaJob {
    pub id: i64,
    pub matrix_cell_id: i64,
    pub company_id: i64,
    pub status: JobStatus,
    pub worker_message_id: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_data_roundtrip_is_tagged() {
        let data = AnswerData::Currency {
            amount: 1250.0,
            code: "EUR".into(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["kind"], "currency");
        assert_eq!(json["amount"], 1250.0);
        let back: AnswerData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_answer_data_question_type() {
        let data = AnswerData::Select {
            option_id: 3,
            option_value: "yes".into(),
        };
        assert_eq!(data.question_type(), QuestionType::Select);
    }
}
