//! # Cellgrid Documents
//!
//! Document upload with content-addressed dedup, chunking, chunk indexing,
//! and hybrid search.
//!
//! ## Components
//!
//! - [`service`] — upload with stream hashing, bloom pre-filter, and
//!   authoritative checksum dedup
//! - [`chunking`] — sentence and agentic chunkers
//! - [`indexing`] — chunk content to storage, records to both indexes
//! - [`search`] — BM25 keyword index, cosine vector index, RRF fusion

pub mod chunking;
pub mod error;
pub mod indexing;
pub mod search;
pub mod service;

pub use chunking::DocumentChunker;
pub use error::{DocumentError, DocumentResult};
pub use indexing::ChunkIndexingService;
pub use search::{
    Bm25KeywordIndex, ChunkRecord, ChunkSearchFilters, ChunkSearchResult,
    ChunkSearchService, CosineVectorIndex, EmbeddingProvider, HashEmbedder,
};
pub use service::{DocumentService, DocumentUploadOptions};
