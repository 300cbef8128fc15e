use thiserror::Error;

use similarity::SimilarityError;

use crate::scorer::ScoreError;

/// Failure of a single evaluation run
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Similarity(#[from] SimilarityError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("Fact extraction failed: {0:#}")]
    Extraction(anyhow::Error),
}
