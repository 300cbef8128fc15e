use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use futures::{StreamExt, TryStreamExt};

use crate::embeddings::Embedder;
use crate::error::SimilarityError;

/// Outcome of comparing two relation labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Similarity {
    /// Cosine similarity in [-1, 1]
    pub score: f64,
    pub is_match: bool,
}

/// Decides whether two relation labels mean the same thing.
///
/// Implementations must be deterministic: the same pair of labels always
/// yields the same score.
pub trait RelationOracle {
    fn score(&self, a: &str, b: &str) -> Result<f64, SimilarityError>;

    fn similar(&self, a: &str, b: &str, threshold: f64) -> Result<Similarity, SimilarityError> {
        let score = self.score(a, b)?;
        Ok(Similarity {
            score,
            is_match: score >= threshold,
        })
    }
}

/// Cosine similarity of two vectors, clamped to [-1, 1].
/// A zero vector is similar to nothing (0.0).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::BackendUnavailable(format!(
            "embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Embeddings for every distinct relation label of one comparison run.
///
/// Built up front so the comparison itself never waits on the backend;
/// a label that was not embedded is reported as `BackendUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    embeddings: HashMap<String, Vec<f32>>,
}

impl EmbeddingTable {
    pub fn from_embeddings(embeddings: HashMap<String, Vec<f32>>) -> Self {
        Self { embeddings }
    }

    /// Embed each distinct label once, at most `concurrency` requests at a time
    pub async fn build<'a, I>(
        embedder: &dyn Embedder,
        labels: I,
        concurrency: usize,
    ) -> Result<Self, SimilarityError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<String> = labels.into_iter().map(str::to_owned).collect();
        tracing::debug!(labels = distinct.len(), concurrency, "Embedding relation labels");

        let embeddings: HashMap<String, Vec<f32>> = futures::stream::iter(distinct)
            .map(|label: String| async move {
                let embedding = embedder.embed(&label).await?;
                Ok::<_, SimilarityError>((label, embedding))
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        Ok(Self { embeddings })
    }

    pub fn get(&self, label: &str) -> Option<&[f32]> {
        self.embeddings.get(label).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    fn lookup(&self, label: &str) -> Result<&[f32], SimilarityError> {
        self.get(label).ok_or_else(|| {
            SimilarityError::BackendUnavailable(format!("no embedding for relation label {:?}", label))
        })
    }
}

impl RelationOracle for EmbeddingTable {
    fn score(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        cosine_similarity(self.lookup(a)?, self.lookup(b)?)
    }
}
