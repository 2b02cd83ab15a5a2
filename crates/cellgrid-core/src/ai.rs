//! AI provider contract.
//!
//! Only the request/response shape is part of this subsystem; the provider
//! SDK surface lives outside. `StaticAiProvider` is the scripted
//! implementation used in tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::model::{AnswerData, QuestionType};

/// Prompt assembled for one cell.
#[derive(Debug, Clone)]
pub struct QaPrompt {
    pub question_text: String,
    pub question_type: QuestionType,
    pub documents: Vec<DocumentContext>,
    pub min_answers: i32,
    pub max_answers: i32,
}

/// A document's content as presented to the provider.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub document_id: i64,
    pub content: String,
}

/// A supporting quote returned by the provider.
#[derive(Debug, Clone)]
pub struct AiCitation {
    pub document_id: i64,
    pub quote_text: String,
}

/// One typed answer with its citations and confidence.
#[derive(Debug, Clone)]
pub struct AiAnswer {
    pub data: AnswerData,
    pub confidence: f64,
    pub citations: Vec<AiCitation>,
}

/// The provider's full response for a cell.
#[derive(Debug, Clone, Default)]
pub struct AiAnswerSet {
    pub answers: Vec<AiAnswer>,
}

impl AiAnswerSet {
    pub fn answer_found(&self) -> bool {
        !self.answers.is_empty()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }
}

/// Request/response contract with the AI provider.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Answer a question over the given document contents.
    async fn answer_question(&self, prompt: &QaPrompt) -> CoreResult<AiAnswerSet>;

    /// Split extracted markdown into semantically coherent chunks.
    async fn chunk_markdown(&self, content: &str) -> CoreResult<Vec<String>>;
}

/// Scripted provider: answers are looked up by question text, chunking
/// splits on blank lines. Unscripted questions yield an empty answer set.
#[derive(Default)]
pub struct StaticAiProvider {
    scripted: Mutex<HashMap<String, AiAnswerSet>>,
    fail_all: bool,
}

impl StaticAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every call fails transiently.
    pub fn failing() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            fail_all: true,
        }
    }

    /// Script the response for a question text.
    pub async fn script_answer(&self, question_text: &str, answers: AiAnswerSet) {
        self.scripted
            .lock()
            .await
            .insert(question_text.to_string(), answers);
    }
}

#[async_trait]
impl AiProvider for StaticAiProvider {
    async fn answer_question(&self, prompt: &QaPrompt) -> CoreResult<AiAnswerSet> {
        if self.fail_all {
            return Err(CoreError::AiProvider("scripted failure".into()));
        }
        Ok(self
            .scripted
            .lock()
            .await
            .get(&prompt.question_text)
            .cloned()
            .unwrap_or_default())
    }

    async fn chunk_markdown(&self, content: &str) -> CoreResult<Vec<String>> {
        if self.fail_all {
            return Err(CoreError::AiProvider("scripted failure".into()));
        }
        Ok(content
            .split("\n\n")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_answers_by_question_text() {
        let provider = StaticAiProvider::new();
        provider
            .script_answer(
                "What is the notice period?",
                AiAnswerSet {
                    answers: vec![AiAnswer {
                        data: AnswerData::Text {
                            value: "90 days".into(),
                        },
                        confidence: 0.9,
                        citations: vec![],
                    }],
                },
            )
            .await;

        let prompt = QaPrompt {
            question_text: "What is the notice period?".into(),
            question_type: QuestionType::Text,
            documents: vec![],
            min_answers: 1,
            max_answers: 1,
        };
        let set = provider.answer_question(&prompt).await.unwrap();
        assert_eq!(set.answer_count(), 1);

        let other = QaPrompt {
            question_text: "Unscripted".into(),
            ..prompt
        };
        assert!(!provider.answer_question(&other).await.unwrap().answer_found());
    }
}
