//! Summary faithfulness evaluation.
//!
//! Facts are extracted from a source text and its summary as
//! (subject, relation, object) triples, each side becomes a directed
//! relation graph, and the graphs are compared edge by edge to produce
//! weighted recall, precision and F1 scores.

pub mod comparator;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod samples;
pub mod scorer;

pub use comparator::{compare, ComparisonResult, EdgeRecord, GraphComparator, PartialEdge};
pub use config::AppConfig;
pub use error::EvalError;
pub use pipeline::{EvaluationInput, Evaluator, EvaluatorSettings, RunOptions};
pub use report::EvaluationReport;
pub use samples::{builtin_samples, load_samples, Sample, SampleSet};
pub use scorer::{ScoreError, Scorer, Scores};
