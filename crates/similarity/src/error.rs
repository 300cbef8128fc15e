use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarityError {
    /// The embedding backend could not produce a vector (network, model load,
    /// timeout, malformed response or missing label).
    #[error("Embedding backend unavailable: {0}")]
    BackendUnavailable(String),
}
