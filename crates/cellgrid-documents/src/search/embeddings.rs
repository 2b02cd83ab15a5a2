//! Embedding provider contract and the deterministic test embedder.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use cellgrid_core::error::CoreResult;

use super::tokenize;

/// Produces dense vectors for chunk content and queries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Deterministic hash-projection embedder: each token is hashed into one of
/// `dims` buckets and the vector is L2-normalized. Texts sharing tokens get
/// nonzero cosine similarity, which is all the tests and local runs need.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dims: 64 }
    }
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(
                digest[0..8].try_into().expect("digest is 32 bytes"),
            ) as usize
                % self.dims;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("termination clause notice").await.unwrap();
        let b = embedder.embed("termination clause notice").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_tokens_raise_similarity() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed("termination notice").await.unwrap();
        let related = embedder.embed("the termination notice period").await.unwrap();
        let unrelated = embedder.embed("quarterly revenue figures").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }
}
