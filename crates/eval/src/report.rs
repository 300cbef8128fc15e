use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use extract::{ExtractionMethod, TripleSet};
use graph::GraphStats;

use crate::comparator::{ComparisonResult, EdgeRecord, PartialEdge};
use crate::config::ExportConfig;
use crate::scorer::{PrecisionWeights, RecallWeights, Scores};

const PREVIEW_CHARS: usize = 200;

/// Everything recorded about one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub source_preview: Option<String>,
    pub summary_preview: Option<String>,
    /// `None` when pre-extracted triples were evaluated
    pub extraction_method: Option<ExtractionMethod>,
    pub model: Option<String>,
    pub embedding_model: String,
    pub threshold: f64,
    pub weights: ReportWeights,
    pub fact_counts: FactCounts,
    pub graphs: GraphPair,
    pub raw_facts: RawFacts,
    pub unmatched: UnmatchedFacts,
    pub comparison: ComparisonResult,
    pub scores: Scores,
    pub timings: Timings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportWeights {
    pub recall: RecallWeights,
    pub precision: PrecisionWeights,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactCounts {
    /// Triples as extracted, before graph construction
    pub source_extracted: usize,
    pub summary_extracted: usize,
    /// Edges classified in each direction
    pub source_total: usize,
    pub summary_total: usize,
    pub matched: usize,
    pub partial_recall: usize,
    pub missing: usize,
    pub correct: usize,
    pub partial_precision: usize,
    pub hallucinations: usize,
}

impl FactCounts {
    pub fn from_comparison(source_extracted: usize, summary_extracted: usize, comparison: &ComparisonResult) -> Self {
        Self {
            source_extracted,
            summary_extracted,
            source_total: comparison.recall.total(),
            summary_total: comparison.precision.total(),
            matched: comparison.recall.matched_relations.len(),
            partial_recall: comparison.recall.partial.len(),
            missing: comparison.recall.missing.len(),
            correct: comparison.precision.correct_relations.len(),
            partial_precision: comparison.precision.partial.len(),
            hallucinations: comparison.precision.hallucinations.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPair {
    pub source: GraphStats,
    pub summary: GraphStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFacts {
    pub source: TripleSet,
    pub summary: TripleSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnmatchedFacts {
    pub missing: Vec<EdgeRecord>,
    pub hallucinated: Vec<EdgeRecord>,
}

impl UnmatchedFacts {
    pub fn from_comparison(comparison: &ComparisonResult) -> Self {
        Self {
            missing: comparison.recall.missing.clone(),
            hallucinated: comparison.precision.hallucinations.clone(),
        }
    }
}

/// Wall-clock time per stage, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timings {
    pub extract_ms: u64,
    pub embed_ms: u64,
    pub compare_ms: u64,
    pub total_ms: u64,
}

/// One classified edge as written to the CSV export
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    subject: &'a str,
    relation: &'a str,
    object: &'a str,
    in_summary_as: Option<&'a str>,
    in_source_as: Option<&'a str>,
}

impl<'a> CsvRow<'a> {
    fn edge(kind: &'static str, edge: &'a EdgeRecord) -> Self {
        Self {
            kind,
            subject: &edge.subject,
            relation: &edge.relation,
            object: &edge.object,
            in_summary_as: None,
            in_source_as: None,
        }
    }

    fn recall_partial(edge: &'a PartialEdge) -> Self {
        Self {
            kind: "recall_partial",
            subject: &edge.subject,
            relation: &edge.relation,
            object: &edge.object,
            in_summary_as: Some(&edge.other_relation),
            in_source_as: None,
        }
    }

    fn precision_wrong_rel(edge: &'a PartialEdge) -> Self {
        Self {
            kind: "precision_wrong_rel",
            subject: &edge.subject,
            relation: &edge.relation,
            object: &edge.object,
            in_summary_as: None,
            in_source_as: Some(&edge.other_relation),
        }
    }
}

fn csv_rows(comparison: &ComparisonResult) -> Vec<CsvRow<'_>> {
    let recall = &comparison.recall;
    let precision = &comparison.precision;

    recall.matched_relations.iter().map(|e| CsvRow::edge("recall_match", e))
        .chain(recall.partial.iter().map(CsvRow::recall_partial))
        .chain(recall.missing.iter().map(|e| CsvRow::edge("recall_missing", e)))
        .chain(precision.correct_relations.iter().map(|e| CsvRow::edge("precision_match", e)))
        .chain(precision.partial.iter().map(CsvRow::precision_wrong_rel))
        .chain(precision.hallucinations.iter().map(|e| CsvRow::edge("precision_hallucination", e)))
        .collect()
}

fn write_comparison_csv(path: &Path, comparison: &ComparisonResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV export: {}", path.display()))?;
    for row in csv_rows(comparison) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// `eval_<timestamp>_<suffix>`
pub fn generate_run_id(timestamp: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("eval_{}_{}", timestamp.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// First 200 characters of `text`, with an ellipsis when truncated
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl EvaluationReport {
    pub fn file_name(&self) -> String {
        format!("{}.json", self.run_id)
    }

    /// Write the report as pretty JSON to `<dir>/<run_id>.json`
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        tracing::info!(path = %path.display(), "Report exported");
        Ok(path)
    }

    /// Write every classified edge to `<dir>/<run_id>.csv`
    pub fn write_csv(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

        let path = dir.join(format!("{}.csv", self.run_id));
        write_comparison_csv(&path, &self.comparison)?;

        tracing::info!(path = %path.display(), "Edge table exported");
        Ok(path)
    }

    /// Write whichever formats `export` enables; returns the files written
    pub fn export(&self, export: &ExportConfig) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if export.json {
            written.push(self.write_json(&export.path)?);
        }
        if export.csv {
            written.push(self.write_csv(&export.path)?);
        }
        Ok(written)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "recall {:.3} | precision {:.3} | f1 {:.3} | hallucinations {}",
            self.scores.recall.normalized,
            self.scores.precision.normalized,
            self.scores.f1_normalized,
            self.fact_counts.hallucinations,
        )
    }
}
