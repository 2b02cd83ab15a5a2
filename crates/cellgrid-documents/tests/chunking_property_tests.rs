//! Property tests for the sentence chunker.

use proptest::prelude::*;

use cellgrid_documents::chunking::sentence_chunks;

proptest! {
    #[test]
    fn chunking_never_loses_sentences(
        sentences in prop::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,20}", 0..40)
    ) {
        let content: String = sentences
            .iter()
            .map(|s| format!("{s}. "))
            .collect();
        let chunks = sentence_chunks(&content);
        let rejoined = chunks.join(" ");
        for sentence in &sentences {
            prop_assert!(rejoined.contains(sentence.as_str()));
        }
    }

    #[test]
    fn chunks_are_never_empty(content in ".{0,2000}") {
        for chunk in sentence_chunks(&content) {
            prop_assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn chunking_is_deterministic(content in ".{0,500}") {
        prop_assert_eq!(sentence_chunks(&content), sentence_chunks(&content));
    }
}
