//! Weighted recall/precision scoring of a [`ComparisonResult`].
//!
//! Recall:
//!   score = matched * (c*K) + partial * K
//!   max   = total_source_facts * (c*K)
//!
//! Precision:
//!   score = correct * (m*L) + partial * L - hallucinations * N
//!   max   = (correct + partial + hallucinations) * (m*L)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::comparator::ComparisonResult;

/// Weights as supplied by configuration: plain key/value pairs
pub type WeightRecord = BTreeMap<String, f64>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Invalid {direction} weights: {problem} '{key}'")]
    InvalidWeights {
        direction: &'static str,
        key: &'static str,
        problem: WeightProblem,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightProblem {
    Missing,
    NonFinite,
}

impl std::fmt::Display for WeightProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightProblem::Missing => f.write_str("missing required key"),
            WeightProblem::NonFinite => f.write_str("non-finite value for"),
        }
    }
}

/// `K`: unit weight of an endpoint-matched edge; `c`: full-credit multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecallWeights {
    #[serde(rename = "K")]
    pub k: f64,
    pub c: f64,
}

/// `L`: unit weight; `m`: full-credit multiplier; `N`: hallucination penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionWeights {
    #[serde(rename = "L")]
    pub l: f64,
    pub m: f64,
    #[serde(rename = "N")]
    pub n: f64,
}

fn required(record: &WeightRecord, direction: &'static str, key: &'static str) -> Result<f64, ScoreError> {
    let invalid = |problem| ScoreError::InvalidWeights { direction, key, problem };
    let value = *record.get(key).ok_or(invalid(WeightProblem::Missing))?;

    if !value.is_finite() {
        return Err(invalid(WeightProblem::NonFinite));
    }
    Ok(value)
}

impl RecallWeights {
    pub fn from_record(record: &WeightRecord) -> Result<Self, ScoreError> {
        Ok(Self {
            k: required(record, "recall", "K")?,
            c: required(record, "recall", "c")?,
        })
    }
}

impl PrecisionWeights {
    pub fn from_record(record: &WeightRecord) -> Result<Self, ScoreError> {
        Ok(Self {
            l: required(record, "precision", "L")?,
            m: required(record, "precision", "m")?,
            n: required(record, "precision", "N")?,
        })
    }
}

/// Raw recall score and the maximum it could have reached
pub fn score_recall(
    matched: usize,
    partial: usize,
    total_source_facts: usize,
    weights: &RecallWeights,
) -> (f64, f64) {
    let full = weights.c * weights.k;
    let score = matched as f64 * full + partial as f64 * weights.k;
    let max_score = total_source_facts as f64 * full;
    (score, max_score)
}

/// Raw precision score (may be negative) and the maximum it could have reached
pub fn score_precision(
    correct: usize,
    partial: usize,
    hallucinations: usize,
    weights: &PrecisionWeights,
) -> (f64, f64) {
    let full = weights.m * weights.l;
    let score = correct as f64 * full + partial as f64 * weights.l - hallucinations as f64 * weights.n;
    let max_score = (correct + partial + hallucinations) as f64 * full;
    (score, max_score)
}

/// Map a raw score into [0, 1]. Negative scores count as zero; a
/// non-positive maximum yields exactly 0.0.
pub fn normalize(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 || max_score.is_nan() {
        return 0.0;
    }
    (score.max(0.0) / max_score).min(1.0)
}

/// Harmonic mean of the two normalized scores, 0.0 when both are zero
pub fn f1(norm_recall: f64, norm_precision: f64) -> f64 {
    let sum = norm_recall + norm_precision;
    if sum == 0.0 {
        return 0.0;
    }
    2.0 * norm_recall * norm_precision / sum
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionScore {
    pub score: f64,
    pub max: f64,
    pub normalized: f64,
}

impl DirectionScore {
    fn new((score, max): (f64, f64)) -> Self {
        Self {
            score,
            max,
            normalized: normalize(score, max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub recall: DirectionScore,
    pub precision: DirectionScore,
    pub f1_normalized: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    recall: RecallWeights,
    precision: PrecisionWeights,
}

impl Scorer {
    pub fn new(recall: RecallWeights, precision: PrecisionWeights) -> Self {
        Self { recall, precision }
    }

    /// Validate both weight records before any scoring happens
    pub fn from_records(recall: &WeightRecord, precision: &WeightRecord) -> Result<Self, ScoreError> {
        Ok(Self::new(
            RecallWeights::from_record(recall)?,
            PrecisionWeights::from_record(precision)?,
        ))
    }

    pub fn recall_weights(&self) -> &RecallWeights {
        &self.recall
    }

    pub fn precision_weights(&self) -> &PrecisionWeights {
        &self.precision
    }

    pub fn score(&self, comparison: &ComparisonResult) -> Scores {
        let recall = &comparison.recall;
        let precision = &comparison.precision;

        let recall = DirectionScore::new(score_recall(
            recall.matched_relations.len(),
            recall.partial.len(),
            recall.total(),
            &self.recall,
        ));
        let precision = DirectionScore::new(score_precision(
            precision.correct_relations.len(),
            precision.partial.len(),
            precision.hallucinations.len(),
            &self.precision,
        ));

        Scores {
            recall,
            precision,
            f1_normalized: f1(recall.normalized, precision.normalized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{EdgeRecord, PartialEdge};

    const RECALL: RecallWeights = RecallWeights { k: 1.0, c: 2.0 };
    const PRECISION: PrecisionWeights = PrecisionWeights { l: 1.0, m: 2.0, n: 1.0 };

    fn record(pairs: &[(&str, f64)]) -> WeightRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn edges(n: usize) -> Vec<EdgeRecord> {
        (0..n)
            .map(|i| EdgeRecord {
                subject: format!("s{i}"),
                relation: "r".to_string(),
                object: format!("o{i}"),
            })
            .collect()
    }

    fn partials(n: usize) -> Vec<PartialEdge> {
        (0..n)
            .map(|i| PartialEdge {
                subject: format!("s{i}"),
                relation: "r".to_string(),
                object: format!("o{i}"),
                other_relation: "q".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_recall_example() {
        let (score, max) = score_recall(1, 0, 2, &RECALL);
        assert_eq!((score, max), (2.0, 4.0));
        assert_eq!(normalize(score, max), 0.5);
    }

    #[test]
    fn test_precision_example() {
        let (score, max) = score_precision(1, 0, 1, &PRECISION);
        assert_eq!((score, max), (1.0, 4.0));
        assert_eq!(normalize(score, max), 0.25);
    }

    #[test]
    fn test_partial_earns_unit_weight() {
        assert_eq!(score_recall(0, 3, 3, &RECALL), (3.0, 6.0));
        assert_eq!(score_precision(0, 2, 0, &PRECISION), (2.0, 4.0));
    }

    #[test]
    fn test_heavy_hallucination_clamps_to_zero() {
        let (score, max) = score_precision(0, 0, 5, &PRECISION);
        assert_eq!(score, -5.0);
        assert_eq!(max, 10.0);
        assert_eq!(normalize(score, max), 0.0);
    }

    #[test]
    fn test_zero_max_guard() {
        for score in [-3.0, 0.0, 7.5, f64::INFINITY] {
            assert_eq!(normalize(score, 0.0), 0.0);
        }
    }

    #[test]
    fn test_normalized_stays_in_unit_interval() {
        for matched in 0..4 {
            for partial in 0..4 {
                for missing in 0..4 {
                    let (s, m) = score_recall(matched, partial, matched + partial + missing, &RECALL);
                    let n = normalize(s, m);
                    assert!((0.0..=1.0).contains(&n));

                    let (s, m) = score_precision(matched, partial, missing, &PRECISION);
                    let n = normalize(s, m);
                    assert!((0.0..=1.0).contains(&n));
                }
            }
        }
    }

    #[test]
    fn test_f1() {
        assert_eq!(f1(0.0, 0.0), 0.0);
        assert_eq!(f1(1.0, 0.0), 0.0);
        assert!((f1(0.5, 0.25) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(f1(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_scorer_on_comparison() {
        let comparison = ComparisonResult {
            recall: crate::comparator::RecallBuckets {
                matched_relations: edges(1),
                partial: Vec::new(),
                missing: edges(1),
            },
            precision: crate::comparator::PrecisionBuckets {
                correct_relations: edges(1),
                partial: partials(0),
                hallucinations: edges(1),
            },
        };

        let scores = Scorer::new(RECALL, PRECISION).score(&comparison);

        assert_eq!(scores.recall, DirectionScore { score: 2.0, max: 4.0, normalized: 0.5 });
        assert_eq!(scores.precision, DirectionScore { score: 1.0, max: 4.0, normalized: 0.25 });
        assert!((scores.f1_normalized - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_comparison_scores_zero() {
        let scores = Scorer::new(RECALL, PRECISION).score(&ComparisonResult::default());

        assert_eq!(scores.recall, DirectionScore { score: 0.0, max: 0.0, normalized: 0.0 });
        assert_eq!(scores.precision, DirectionScore { score: 0.0, max: 0.0, normalized: 0.0 });
        assert_eq!(scores.f1_normalized, 0.0);
    }

    #[test]
    fn test_missing_weight_key() {
        let err = Scorer::from_records(
            &record(&[("K", 1.0)]),
            &record(&[("L", 1.0), ("m", 2.0), ("N", 1.0)]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScoreError::InvalidWeights { direction: "recall", key: "c", problem: WeightProblem::Missing }
        );

        let err = Scorer::from_records(
            &record(&[("K", 1.0), ("c", 2.0)]),
            &record(&[("L", 1.0), ("m", 2.0)]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScoreError::InvalidWeights { direction: "precision", key: "N", problem: WeightProblem::Missing }
        );
        assert_eq!(err.to_string(), "Invalid precision weights: missing required key 'N'");
    }

    #[test]
    fn test_weight_keys_are_case_sensitive() {
        let result = Scorer::from_records(
            &record(&[("k", 1.0), ("c", 2.0)]),
            &record(&[("L", 1.0), ("m", 2.0), ("N", 1.0)]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_weight() {
        let err = RecallWeights::from_record(&record(&[("K", f64::NAN), ("c", 2.0)])).unwrap_err();
        assert_eq!(
            err,
            ScoreError::InvalidWeights { direction: "recall", key: "K", problem: WeightProblem::NonFinite }
        );
    }

    #[test]
    fn test_weights_from_records() {
        let scorer = Scorer::from_records(
            &record(&[("K", 1.0), ("c", 2.0), ("unused", 9.0)]),
            &record(&[("L", 1.0), ("m", 2.0), ("N", 0.5)]),
        )
        .unwrap();
        assert_eq!(*scorer.recall_weights(), RECALL);
        assert_eq!(scorer.precision_weights().n, 0.5);
    }
}
