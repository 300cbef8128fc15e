//! Relation-label similarity backed by sentence embeddings.

pub mod cache;
pub mod embeddings;
pub mod error;
pub mod oracle;
pub mod retry;

pub use cache::{CacheStats, EmbeddingCache};
pub use embeddings::{Embedder, EmbeddingClient, RequestFailure};
pub use error::SimilarityError;
pub use oracle::{cosine_similarity, EmbeddingTable, RelationOracle, Similarity};
pub use retry::{RetryPolicy, Transient};
