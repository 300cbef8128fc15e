//! End-to-end evaluation: extract facts from both texts, build the two
//! relation graphs, compare them and score the comparison.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use extract::{ExtractionMethod, FactExtractor, OllamaClient, TripleSet};
use graph::build_graph;
use ingest::ChunkerConfig;
use similarity::{Embedder, EmbeddingCache, EmbeddingClient, EmbeddingTable, RetryPolicy};

use crate::comparator::{aligned_labels, GraphComparator};
use crate::config::{AppConfig, WeightsConfig};
use crate::error::EvalError;
use crate::report::{
    generate_run_id, preview, EvaluationReport, FactCounts, GraphPair, RawFacts, ReportWeights, Timings,
    UnmatchedFacts,
};
use crate::scorer::Scorer;

#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    pub threshold: f64,
    /// `None` extracts each text in one piece
    pub chunking: Option<ChunkerConfig>,
    pub embed_concurrency: usize,
    pub extraction_method: ExtractionMethod,
    pub model: String,
    pub embedding_model: String,
}

impl EvaluatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            chunking: config.chunking.enabled.then_some(ChunkerConfig {
                chunk_size: config.chunking.chunk_size,
            }),
            embed_concurrency: config.embedding.concurrency,
            extraction_method: config.extraction.method,
            model: config.ollama.model.clone(),
            embedding_model: config.embedding.model.clone(),
        }
    }
}

/// What to evaluate: raw texts, or facts that were already extracted
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EvaluationInput {
    Text { source: String, summary: String },
    Triples { source_triples: TripleSet, summary_triples: TripleSet },
}

/// Per-run overrides of the configured values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunOptions {
    pub threshold: Option<f64>,
    pub weights: Option<WeightsConfig>,
}

pub struct Evaluator {
    extractor: Box<dyn FactExtractor>,
    embedder: Arc<dyn Embedder>,
    scorer: Scorer,
    settings: EvaluatorSettings,
}

impl Evaluator {
    pub fn new(
        extractor: Box<dyn FactExtractor>,
        embedder: Arc<dyn Embedder>,
        scorer: Scorer,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            extractor,
            embedder,
            scorer,
            settings,
        }
    }

    /// Wire the Ollama extractor and embedding client described by `config`.
    /// `cache` is shared across runs when given.
    pub fn from_config(config: &AppConfig, cache: Option<Arc<EmbeddingCache>>) -> Result<Self> {
        let scorer = Scorer::from_records(&config.weights.recall, &config.weights.precision)
            .context("Invalid scoring weights in configuration")?;

        let llm_client = OllamaClient::with_timeout(
            config.ollama.base_url.clone(),
            config.ollama.model.clone(),
            Duration::from_secs(config.ollama.request_timeout_secs),
        )?;
        let extractor = config
            .extraction
            .method
            .build(llm_client, config.extraction.json_retries);

        let mut embedding_client = EmbeddingClient::with_timeout(
            config.embedding.base_url.clone(),
            config.embedding.model.clone(),
            Duration::from_secs(config.embedding.request_timeout_secs),
        )?
        .with_retry(RetryPolicy::new(
            config.retry.max_retries,
            config.retry.initial_backoff_ms,
            config.retry.max_backoff_ms,
        ));
        if let Some(cache) = cache {
            embedding_client = embedding_client.with_cache(cache);
        }

        Ok(Self::new(
            extractor,
            Arc::new(embedding_client),
            scorer,
            EvaluatorSettings::from_config(config),
        ))
    }

    pub async fn evaluate(&self, source: &str, summary: &str) -> Result<EvaluationReport, EvalError> {
        self.run(
            EvaluationInput::Text {
                source: source.to_string(),
                summary: summary.to_string(),
            },
            &RunOptions::default(),
        )
        .await
    }

    pub async fn evaluate_triples(
        &self,
        source: TripleSet,
        summary: TripleSet,
    ) -> Result<EvaluationReport, EvalError> {
        self.run(
            EvaluationInput::Triples {
                source_triples: source,
                summary_triples: summary,
            },
            &RunOptions::default(),
        )
        .await
    }

    pub async fn run(&self, input: EvaluationInput, options: &RunOptions) -> Result<EvaluationReport, EvalError> {
        let threshold = options.threshold.unwrap_or(self.settings.threshold);
        let scorer = match &options.weights {
            Some(weights) => Scorer::from_records(&weights.recall, &weights.precision)?,
            None => self.scorer,
        };

        let started = Instant::now();
        let timestamp = chrono::Utc::now();
        let run_id = generate_run_id(timestamp);
        tracing::info!(run_id = %run_id, threshold, "Starting evaluation");

        let mut timings = Timings::default();
        let extracted = matches!(input, EvaluationInput::Text { .. });
        let (source_facts, summary_facts, source_preview, summary_preview) = match input {
            EvaluationInput::Text { source, summary } => {
                let stage = Instant::now();
                let source_facts = self
                    .extract_text("source", &source)
                    .await
                    .map_err(EvalError::Extraction)?;
                let summary_facts = self
                    .extract_text("summary", &summary)
                    .await
                    .map_err(EvalError::Extraction)?;
                timings.extract_ms = elapsed_ms(stage);
                (source_facts, summary_facts, Some(preview(&source)), Some(preview(&summary)))
            }
            EvaluationInput::Triples {
                source_triples,
                summary_triples,
            } => (source_triples, summary_triples, None, None),
        };

        tracing::info!(
            source_facts = source_facts.len(),
            summary_facts = summary_facts.len(),
            "Facts ready"
        );

        let source_graph = build_graph(&source_facts);
        let summary_graph = build_graph(&summary_facts);

        let stage = Instant::now();
        let labels = aligned_labels(&source_graph, &summary_graph);
        let table = EmbeddingTable::build(
            self.embedder.as_ref(),
            labels.iter().copied(),
            self.settings.embed_concurrency,
        )
        .await?;
        timings.embed_ms = elapsed_ms(stage);

        let stage = Instant::now();
        let comparison = GraphComparator::new(&table, threshold).compare(&source_graph, &summary_graph)?;
        timings.compare_ms = elapsed_ms(stage);

        let scores = scorer.score(&comparison);
        timings.total_ms = elapsed_ms(started);

        tracing::info!(
            run_id = %run_id,
            recall = scores.recall.normalized,
            precision = scores.precision.normalized,
            f1 = scores.f1_normalized,
            hallucinations = comparison.precision.hallucinations.len(),
            total_ms = timings.total_ms,
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            run_id,
            timestamp,
            source_preview,
            summary_preview,
            extraction_method: extracted.then_some(self.settings.extraction_method),
            model: extracted.then(|| self.settings.model.clone()),
            embedding_model: self.settings.embedding_model.clone(),
            threshold,
            weights: ReportWeights {
                recall: *scorer.recall_weights(),
                precision: *scorer.precision_weights(),
            },
            fact_counts: FactCounts::from_comparison(source_facts.len(), summary_facts.len(), &comparison),
            graphs: GraphPair {
                source: source_graph.stats(),
                summary: summary_graph.stats(),
            },
            raw_facts: RawFacts {
                source: source_facts,
                summary: summary_facts,
            },
            unmatched: UnmatchedFacts::from_comparison(&comparison),
            comparison,
            scores,
            timings,
        })
    }

    async fn extract_text(&self, name: &str, text: &str) -> Result<TripleSet> {
        let chunks = ingest::chunk_document(name, text, self.settings.chunking);
        tracing::debug!(document = name, chunks = chunks.len(), "Extracting facts");

        extract::extract_chunks(self.extractor.as_ref(), chunks.iter().map(|c| c.text.as_str()).collect::<Vec<&str>>())
            .await
            .with_context(|| format!("Failed to extract facts from {}", name))
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::Triple;
    use similarity::SimilarityError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::scorer::ScoreError;

    /// Treats the text itself as `(subject, relation, object)` lines
    struct EchoExtractor;

    #[async_trait]
    impl FactExtractor for EchoExtractor {
        fn name(&self) -> &str {
            "echo"
        }

        async fn extract(&self, text: &str) -> Result<Vec<Triple>> {
            Ok(extract::parser::parse_triples(text))
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl FactExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract(&self, _text: &str) -> Result<Vec<Triple>> {
            anyhow::bail!("model not found")
        }
    }

    struct FixedEmbedder {
        vectors: HashMap<&'static str, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new() -> Self {
            Self {
                vectors: HashMap::from([
                    ("capital of", vec![1.0, 0.0, 0.0]),
                    ("is the capital of", vec![0.98, 0.2, 0.0]),
                    ("located in", vec![0.0, 1.0, 0.0]),
                    ("born in", vec![0.0, 0.0, 1.0]),
                ]),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, SimilarityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| SimilarityError::BackendUnavailable(format!("connection refused for {:?}", text)))
        }
    }

    fn settings() -> EvaluatorSettings {
        EvaluatorSettings {
            threshold: 0.75,
            chunking: None,
            embed_concurrency: 2,
            extraction_method: ExtractionMethod::Line,
            model: "llama3".to_string(),
            embedding_model: "all-minilm".to_string(),
        }
    }

    fn default_scorer() -> Scorer {
        let weights = WeightsConfig::default();
        Scorer::from_records(&weights.recall, &weights.precision).unwrap()
    }

    fn evaluator_with(extractor: Box<dyn FactExtractor>, embedder: Arc<FixedEmbedder>) -> Evaluator {
        Evaluator::new(extractor, embedder, default_scorer(), settings())
    }

    const SOURCE: &str = "(Paris, capital of, France)\n(Paris, located in, Europe)";
    const SUMMARY: &str = "(Paris, is the capital of, France)\n(Paris, born in, Europe)\n(Berlin, capital of, Germany)";

    #[tokio::test]
    async fn test_evaluate_texts() {
        let embedder = Arc::new(FixedEmbedder::new());
        let evaluator = evaluator_with(Box::new(EchoExtractor), embedder.clone());

        let report = evaluator.evaluate(SOURCE, SUMMARY).await.unwrap();

        assert_eq!(report.fact_counts.source_extracted, 2);
        assert_eq!(report.fact_counts.summary_extracted, 3);
        assert_eq!(report.fact_counts.source_total, 2);
        assert_eq!(report.fact_counts.summary_total, 3);
        assert_eq!(report.fact_counts.matched, 1);
        assert_eq!(report.fact_counts.partial_recall, 1);
        assert_eq!(report.fact_counts.missing, 0);
        assert_eq!(report.fact_counts.correct, 1);
        assert_eq!(report.fact_counts.partial_precision, 1);
        assert_eq!(report.fact_counts.hallucinations, 1);
        assert_eq!(report.unmatched.hallucinated[0].subject, "Berlin");

        assert!((report.scores.recall.normalized - 0.75).abs() < 1e-9);
        assert!((report.scores.precision.normalized - 2.0 / 6.0).abs() < 1e-9);
        assert!((report.scores.f1_normalized - 6.0 / 13.0).abs() < 1e-9);

        // Only the four labels on aligned pairs are embedded, once each
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.extraction_method, Some(ExtractionMethod::Line));
        assert_eq!(report.source_preview.as_deref(), Some(SOURCE));
        assert!(report.run_id.starts_with("eval_"));
    }

    #[tokio::test]
    async fn test_threshold_override() {
        let evaluator = evaluator_with(Box::new(EchoExtractor), Arc::new(FixedEmbedder::new()));
        let options = RunOptions {
            threshold: Some(0.99),
            weights: None,
        };

        let report = evaluator
            .run(
                EvaluationInput::Text {
                    source: SOURCE.to_string(),
                    summary: SUMMARY.to_string(),
                },
                &options,
            )
            .await
            .unwrap();

        assert_eq!(report.threshold, 0.99);
        assert_eq!(report.fact_counts.matched, 0);
        assert_eq!(report.fact_counts.partial_recall, 2);
    }

    #[tokio::test]
    async fn test_evaluate_triples_skips_extraction() {
        let embedder = Arc::new(FixedEmbedder::new());
        let evaluator = evaluator_with(Box::new(FailingExtractor), embedder.clone());

        let source = TripleSet::from(vec![Triple::new("Paris", "capital of", "France")]);
        let report = evaluator
            .evaluate_triples(source, TripleSet::new())
            .await
            .unwrap();

        assert_eq!(report.fact_counts.missing, 1);
        assert_eq!(report.scores.recall.normalized, 0.0);
        assert_eq!(report.scores.precision.normalized, 0.0);
        assert_eq!(report.scores.f1_normalized, 0.0);
        assert_eq!(report.extraction_method, None);
        assert_eq!(report.source_preview, None);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_run() {
        let evaluator = evaluator_with(Box::new(EchoExtractor), Arc::new(FixedEmbedder::new()));

        let err = evaluator
            .evaluate("(Paris, capital of, France)", "(Paris, unknown label, France)")
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::Similarity(SimilarityError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_extraction_failure() {
        let evaluator = evaluator_with(Box::new(FailingExtractor), Arc::new(FixedEmbedder::new()));

        let err = evaluator.evaluate(SOURCE, SUMMARY).await.unwrap_err();

        assert!(matches!(err, EvalError::Extraction(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_invalid_weight_override() {
        let evaluator = evaluator_with(Box::new(EchoExtractor), Arc::new(FixedEmbedder::new()));
        let mut weights = WeightsConfig::default();
        weights.precision.remove("N");

        let err = evaluator
            .run(
                EvaluationInput::Text {
                    source: SOURCE.to_string(),
                    summary: SUMMARY.to_string(),
                },
                &RunOptions {
                    threshold: None,
                    weights: Some(weights),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::Score(ScoreError::InvalidWeights { key: "N", .. })));
    }

    #[tokio::test]
    async fn test_report_export() {
        let evaluator = evaluator_with(Box::new(EchoExtractor), Arc::new(FixedEmbedder::new()));
        let report = evaluator.evaluate(SOURCE, SUMMARY).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = report.write_json(dir.path()).unwrap();

        assert_eq!(path.file_name().unwrap().to_str().unwrap(), report.file_name());
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["run_id"], report.run_id.as_str());
        assert_eq!(json["fact_counts"]["hallucinations"], 1);
        assert_eq!(json["raw_facts"]["source"][0]["relation"], "capital of");
    }

    #[test]
    fn test_input_shapes() {
        let text: EvaluationInput =
            serde_json::from_str(r#"{"source": "a", "summary": "b"}"#).unwrap();
        assert!(matches!(text, EvaluationInput::Text { .. }));

        let triples: EvaluationInput = serde_json::from_str(
            r#"{"source_triples": [{"subject": "a", "predicate": "r", "object": "b"}], "summary_triples": []}"#,
        )
        .unwrap();
        match triples {
            EvaluationInput::Triples { source_triples, .. } => assert_eq!(source_triples.len(), 1),
            other => panic!("unexpected input {:?}", other),
        }
    }
}
