//! Relation graphs: directed graphs whose nodes are entity strings and whose
//! edges carry a single relation label.

pub mod relation_graph;

pub use relation_graph::{build_graph, EdgeRef, GraphStats, RelationGraph};
