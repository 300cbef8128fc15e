//! Alignment of a source graph against a summary graph.
//!
//! Edges are aligned by their ordered (subject, object) pair, never by label.
//! An aligned pair is then classified by asking the oracle whether the two
//! relation labels mean the same thing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use graph::{EdgeRef, RelationGraph};
use similarity::{RelationOracle, SimilarityError};

/// A fully resolved edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

/// An edge whose endpoints align but whose label did not match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEdge {
    pub subject: String,
    pub relation: String,
    pub object: String,
    /// The conflicting label found in the opposite graph
    pub other_relation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallBuckets {
    pub matched_relations: Vec<EdgeRecord>,
    pub partial: Vec<PartialEdge>,
    pub missing: Vec<EdgeRecord>,
}

impl RecallBuckets {
    /// Number of source facts classified
    pub fn total(&self) -> usize {
        self.matched_relations.len() + self.partial.len() + self.missing.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecisionBuckets {
    pub correct_relations: Vec<EdgeRecord>,
    pub partial: Vec<PartialEdge>,
    pub hallucinations: Vec<EdgeRecord>,
}

impl PrecisionBuckets {
    /// Number of summary facts classified
    pub fn total(&self) -> usize {
        self.correct_relations.len() + self.partial.len() + self.hallucinations.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub recall: RecallBuckets,
    pub precision: PrecisionBuckets,
}

#[derive(Clone, Copy)]
enum Direction {
    Recall,
    Precision,
}

enum Outcome<'g> {
    Match,
    Mismatch(&'g str),
    Unaligned,
}

/// Classifies every edge of two graphs using a relation oracle.
///
/// Both graphs are only read. Any oracle failure aborts the whole
/// comparison; no partial result is returned.
pub struct GraphComparator<'o, O: ?Sized> {
    oracle: &'o O,
    threshold: f64,
}

impl<'o, O: RelationOracle + ?Sized> GraphComparator<'o, O> {
    pub fn new(oracle: &'o O, threshold: f64) -> Self {
        Self { oracle, threshold }
    }

    pub fn compare(
        &self,
        source: &RelationGraph,
        summary: &RelationGraph,
    ) -> Result<ComparisonResult, SimilarityError> {
        let recall = self.recall_pass(source, summary)?;
        let precision = self.precision_pass(source, summary)?;

        tracing::debug!(
            matched = recall.matched_relations.len(),
            recall_partial = recall.partial.len(),
            missing = recall.missing.len(),
            correct = precision.correct_relations.len(),
            precision_partial = precision.partial.len(),
            hallucinations = precision.hallucinations.len(),
            "Graphs compared"
        );

        Ok(ComparisonResult { recall, precision })
    }

    /// Source -> summary: how much of the source survived
    fn recall_pass(
        &self,
        source: &RelationGraph,
        summary: &RelationGraph,
    ) -> Result<RecallBuckets, SimilarityError> {
        let mut buckets = RecallBuckets::default();

        for edge in source.edges() {
            match self.classify(edge, summary, Direction::Recall)? {
                Outcome::Match => buckets.matched_relations.push(record(edge)),
                Outcome::Mismatch(other) => buckets.partial.push(partial(edge, other)),
                Outcome::Unaligned => buckets.missing.push(record(edge)),
            }
        }

        Ok(buckets)
    }

    /// Summary -> source: how much of the summary is supported
    fn precision_pass(
        &self,
        source: &RelationGraph,
        summary: &RelationGraph,
    ) -> Result<PrecisionBuckets, SimilarityError> {
        let mut buckets = PrecisionBuckets::default();

        for edge in summary.edges() {
            match self.classify(edge, source, Direction::Precision)? {
                Outcome::Match => buckets.correct_relations.push(record(edge)),
                Outcome::Mismatch(other) => buckets.partial.push(partial(edge, other)),
                Outcome::Unaligned => buckets.hallucinations.push(record(edge)),
            }
        }

        Ok(buckets)
    }

    fn classify<'g>(
        &self,
        edge: EdgeRef<'_>,
        opposite: &'g RelationGraph,
        direction: Direction,
    ) -> Result<Outcome<'g>, SimilarityError> {
        let Some(other) = opposite.relation(edge.subject, edge.object) else {
            return Ok(Outcome::Unaligned);
        };

        // the oracle is always asked (source label, summary label)
        let (source_label, summary_label) = match direction {
            Direction::Recall => (edge.relation, other),
            Direction::Precision => (other, edge.relation),
        };
        let similarity = self.oracle.similar(source_label, summary_label, self.threshold)?;
        tracing::trace!(
            subject = edge.subject,
            object = edge.object,
            source_label,
            summary_label,
            score = similarity.score,
            is_match = similarity.is_match,
            "Aligned edge"
        );

        Ok(if similarity.is_match {
            Outcome::Match
        } else {
            Outcome::Mismatch(other)
        })
    }
}

/// Convenience wrapper around [`GraphComparator`]
pub fn compare<O: RelationOracle + ?Sized>(
    source: &RelationGraph,
    summary: &RelationGraph,
    threshold: f64,
    oracle: &O,
) -> Result<ComparisonResult, SimilarityError> {
    GraphComparator::new(oracle, threshold).compare(source, summary)
}

/// Relation labels the oracle will be asked about: those on node pairs
/// present in both graphs
pub fn aligned_labels<'g>(source: &'g RelationGraph, summary: &'g RelationGraph) -> BTreeSet<&'g str> {
    let mut labels = BTreeSet::new();
    for edge in source.edges() {
        if let Some(other) = summary.relation(edge.subject, edge.object) {
            labels.insert(edge.relation);
            labels.insert(other);
        }
    }
    labels
}

fn record(edge: EdgeRef<'_>) -> EdgeRecord {
    EdgeRecord {
        subject: edge.subject.to_string(),
        relation: edge.relation.to_string(),
        object: edge.object.to_string(),
    }
}

fn partial(edge: EdgeRef<'_>, other: &str) -> PartialEdge {
    PartialEdge {
        subject: edge.subject.to_string(),
        relation: edge.relation.to_string(),
        object: edge.object.to_string(),
        other_relation: other.to_string(),
    }
}
