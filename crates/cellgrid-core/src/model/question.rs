//! Question rows consumed by QA routing and prompting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::QuestionType;

/// A question asked of every document (or document pair) in a matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub matrix_id: i64,
    pub company_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Routes QA for this question to the agent workflow when true.
    pub use_agent_qa: bool,
    pub min_answers: i32,
    pub max_answers: i32,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub matrix_id: i64,
    pub company_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub use_agent_qa: bool,
    pub min_answers: i32,
    pub max_answers: i32,
}
