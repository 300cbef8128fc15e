use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A (subject, relation, object) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    #[serde(alias = "predicate")]
    pub relation: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// Trim all three fields; `None` if any of them ends up empty
    pub fn cleaned(self) -> Option<Self> {
        let triple = Self::new(self.subject.trim(), self.relation.trim(), self.object.trim());
        if triple.subject.is_empty() || triple.relation.is_empty() || triple.object.is_empty() {
            return None;
        }
        Some(triple)
    }
}

/// Ordered collection of extracted triples. Duplicates are kept as extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripleSet {
    triples: Vec<Triple>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, triple: Triple) {
        self.triples.push(triple);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    pub fn as_slice(&self) -> &[Triple] {
        &self.triples
    }

    /// Drop structural duplicates, keeping the first occurrence of each
    pub fn deduplicated(&self) -> Self {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect()
    }
}

impl From<Vec<Triple>> for TripleSet {
    fn from(triples: Vec<Triple>) -> Self {
        Self { triples }
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl Extend<Triple> for TripleSet {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter);
    }
}

impl<'a> IntoIterator for &'a TripleSet {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}
