mod metrics;
mod server;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eval::{AppConfig, EvaluationReport, Evaluator};
use extract::ExtractionMethod;
use ingest::FileReader;
use similarity::EmbeddingCache;

/// Score how faithfully a summary preserves the facts of its source
#[derive(Parser)]
#[command(name = "factgraph", version, about)]
struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one source/summary pair
    Evaluate(EvaluateArgs),
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

#[derive(Args)]
struct EvaluateArgs {
    /// Source text, taken verbatim
    #[arg(long, required_unless_present = "source_file", conflicts_with = "source_file")]
    source: Option<String>,

    /// Read the source from a .txt or .md file
    #[arg(long)]
    source_file: Option<PathBuf>,

    /// Summary text, taken verbatim
    #[arg(long, required_unless_present = "summary_file", conflicts_with = "summary_file")]
    summary: Option<String>,

    /// Read the summary from a .txt or .md file
    #[arg(long)]
    summary_file: Option<PathBuf>,

    /// Extraction method: line (alias ollama), json or hybrid
    #[arg(long)]
    method: Option<ExtractionMethod>,

    /// Ollama model for extraction
    #[arg(long)]
    model: Option<String>,

    /// Cosine similarity threshold for relation matching
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, overrides_with = "no_chunk")]
    chunk: bool,

    #[arg(long, overrides_with = "chunk")]
    no_chunk: bool,

    /// Skip writing the JSON and CSV exports
    #[arg(long)]
    no_export: bool,
}

impl EvaluateArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(method) = self.method {
            config.extraction.method = method;
        }
        if let Some(model) = &self.model {
            config.ollama.model = model.clone();
        }
        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if self.chunk {
            config.chunking.enabled = true;
        }
        if self.no_chunk {
            config.chunking.enabled = false;
        }
        if self.no_export {
            config.export.json = false;
            config.export.csv = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    eval::logging::init(cli.log_json);

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate(args) => {
            args.apply(&mut config);
            config.validate()?;
            run_evaluate(&config, &args).await
        }
        Commands::Serve { addr } => run_server(config, &addr).await,
    }
}

async fn run_evaluate(config: &AppConfig, args: &EvaluateArgs) -> Result<()> {
    let source = read_input(args.source.as_deref(), args.source_file.as_deref()).await?;
    let summary = read_input(args.summary.as_deref(), args.summary_file.as_deref()).await?;

    let evaluator = Evaluator::from_config(config, None)?;
    let report = evaluator.evaluate(&source, &summary).await?;
    let exported = report.export(&config.export)?;

    print_report(&report, &exported);
    Ok(())
}

/// Literal text wins; otherwise the file is read. clap guarantees exactly one is set.
async fn read_input(text: Option<&str>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => FileReader::read_file(path).await,
        (None, None) => anyhow::bail!("no input given"),
    }
}

fn print_report(report: &EvaluationReport, exported: &[PathBuf]) {
    let scores = &report.scores;

    println!("\n{}", "=".repeat(60));
    println!("📊 EVALUATION RESULTS");
    println!("{}", "=".repeat(60));
    println!(
        "🔍 Recall Score:       {:.2} / {:.2} → Normalized: {:.3}",
        scores.recall.score, scores.recall.max, scores.recall.normalized
    );
    println!(
        "🎯 Precision Score:    {:.2} / {:.2} → Normalized: {:.3}",
        scores.precision.score, scores.precision.max, scores.precision.normalized
    );
    println!("⭐ F1 Score:           {:.3}", scores.f1_normalized);
    for path in exported {
        println!("📁 Exported to: {}", path.display());
    }

    let hallucinations = &report.unmatched.hallucinated;
    if !hallucinations.is_empty() {
        println!("\n❌ Detected Hallucinations:");
        for fact in hallucinations {
            println!("  • ({}, {}, {})", fact.subject, fact.relation, fact.object);
        }
    }
}

async fn run_server(config: AppConfig, addr: &str) -> Result<()> {
    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(EmbeddingCache::new(config.cache.max_entries)));

    let evaluator = Evaluator::from_config(&config, cache.clone())?;
    let state = server::AppState::new(evaluator, cache, config.ollama.base_url.clone(), config.export.clone());
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
