//! Chunking of extracted markdown.
//!
//! Sentence chunking is the deterministic default; agentic chunking asks
//! the AI provider to split on semantic boundaries and is quota-gated by
//! the workflow that calls it.

use std::sync::Arc;

use tracing::debug;

use cellgrid_core::ai::AiProvider;
use cellgrid_core::model::ChunkingStrategy;

use crate::error::{DocumentError, DocumentResult};

/// Maximum characters packed into one sentence chunk.
const MAX_CHUNK_CHARS: usize = 1200;

/// Split markdown into sentence-packed chunks of bounded size. Sentences
/// are never split; a single oversized sentence becomes its own chunk.
pub fn sentence_chunks(content: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in split_sentences(content) {
        if !current.is_empty() && current.len() + sentence.len() + 1 > MAX_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_sentences(content: &str) -> impl Iterator<Item = &str> {
    content
        .split_inclusive(['.', '?', '!', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Chunker dispatching on the selected strategy.
#[derive(Clone)]
pub struct DocumentChunker {
    ai: Arc<dyn AiProvider>,
}

impl DocumentChunker {
    pub fn new(ai: Arc<dyn AiProvider>) -> Self {
        Self { ai }
    }

    /// Produce chunks for a document's extracted markdown.
    pub async fn chunk(
        &self,
        document_id: i64,
        content: &str,
        strategy: ChunkingStrategy,
    ) -> DocumentResult<Vec<String>> {
        let chunks = match strategy {
            ChunkingStrategy::Sentence => sentence_chunks(content),
            ChunkingStrategy::Agentic => self.ai.chunk_markdown(content).await?,
        };
        debug!(document_id, ?strategy, count = chunks.len(), "chunked document");
        if chunks.is_empty() && !content.trim().is_empty() {
            return Err(DocumentError::ChunkingFailed {
                document_id,
                reason: "no chunks produced from non-empty content".into(),
            });
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_chunks_respect_size_budget() {
        let content = "First sentence. Second sentence! Third sentence? Fourth.";
        let chunks = sentence_chunks(content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            "First sentence. Second sentence! Third sentence? Fourth."
        );

        let long = "word ".repeat(400);
        let sentences: String = (0..5).map(|_| format!("{long}. ")).collect();
        let chunks = sentence_chunks(&sentences);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // One oversized sentence may exceed the budget on its own, but
            // no chunk packs two of them.
            assert!(chunk.len() <= 2 * MAX_CHUNK_CHARS);
        }
    }

    #[test]
    fn test_empty_content_yields_no_chunks() {
        assert!(sentence_chunks("").is_empty());
        assert!(sentence_chunks("   \n  ").is_empty());
    }

    #[tokio::test]
    async fn test_agentic_chunking_uses_provider() {
        let provider = Arc::new(cellgrid_core::ai::StaticAiProvider::new());
        let chunker = DocumentChunker::new(provider);
        let chunks = chunker
            .chunk(1, "section one\n\nsection two", ChunkingStrategy::Agentic)
            .await
            .unwrap();
        assert_eq!(chunks, vec!["section one", "section two"]);
    }
}
