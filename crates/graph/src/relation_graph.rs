use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use extract::Triple;

/// Directed graph with at most one labeled edge per ordered node pair.
///
/// Nodes are identified by exact string match. Inserting a second relation
/// between the same (subject, object) pair replaces the first label
/// (last write wins); the edge keeps its original position in iteration order.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    graph: DiGraph<String, String>,
    entity_to_idx: HashMap<String, NodeIndex>,
    overwritten: usize,
}

/// A borrowed view of one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeRef<'a> {
    pub subject: &'a str,
    pub relation: &'a str,
    pub object: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    /// Triples whose label replaced an earlier one on the same node pair
    pub overwritten: usize,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_entity(&mut self, entity: &str) -> NodeIndex {
        if let Some(&idx) = self.entity_to_idx.get(entity) {
            return idx;
        }

        let idx = self.graph.add_node(entity.to_string());
        self.entity_to_idx.insert(entity.to_string(), idx);
        idx
    }

    /// Insert `subject -> object` labeled `relation`.
    /// Returns the label it replaced, if the pair already had one.
    pub fn add_relation(&mut self, subject: &str, relation: &str, object: &str) -> Option<String> {
        let source = self.add_entity(subject);
        let target = self.add_entity(object);

        match self.graph.find_edge(source, target) {
            Some(edge) => {
                self.overwritten += 1;
                let previous = std::mem::replace(&mut self.graph[edge], relation.to_string());
                Some(previous)
            }
            None => {
                self.graph.add_edge(source, target, relation.to_string());
                None
            }
        }
    }

    /// Label of the edge `subject -> object`, if present
    pub fn relation(&self, subject: &str, object: &str) -> Option<&str> {
        let source = *self.entity_to_idx.get(subject)?;
        let target = *self.entity_to_idx.get(object)?;
        self.graph
            .find_edge(source, target)
            .map(|edge| self.graph[edge].as_str())
    }

    /// Edges in insertion order of their node pair
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        self.graph.edge_references().map(|edge| EdgeRef {
            subject: self.graph[edge.source()].as_str(),
            relation: edge.weight().as_str(),
            object: self.graph[edge.target()].as_str(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            overwritten: self.overwritten,
        }
    }
}

/// Build a relation graph from triples, in order.
pub fn build_graph<'a, I>(triples: I) -> RelationGraph
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut graph = RelationGraph::new();

    for triple in triples {
        if let Some(previous) = graph.add_relation(&triple.subject, &triple.relation, &triple.object) {
            if previous != triple.relation {
                tracing::warn!(
                    subject = %triple.subject,
                    object = %triple.object,
                    replaced = %previous,
                    relation = %triple.relation,
                    "Relation label overwritten for existing node pair"
                );
            }
        }
    }

    graph
}
