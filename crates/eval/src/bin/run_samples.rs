use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use eval::{AppConfig, EvaluationReport, Evaluator, SampleSet};

/// Evaluate every sample in a sample set and tabulate the scores
#[derive(Parser)]
#[command(name = "run_samples")]
struct Args {
    /// JSON file mapping sample names to {source, summary}
    #[arg(long, default_value = "sample_inputs/test_samples.json")]
    samples: PathBuf,

    /// Only run this sample
    #[arg(long)]
    sample: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the summary files
    #[arg(long, default_value = "results")]
    output: PathBuf,

    #[arg(long)]
    log_json: bool,
}

#[derive(Serialize)]
struct SampleResult {
    name: String,
    recall: f64,
    precision: f64,
    f1: f64,
    source_facts: usize,
    summary_facts: usize,
    hallucinations: usize,
    total_ms: u64,
    run_id: String,
}

impl SampleResult {
    fn new(name: &str, report: &EvaluationReport) -> Self {
        Self {
            name: name.to_string(),
            recall: report.scores.recall.normalized,
            precision: report.scores.precision.normalized,
            f1: report.scores.f1_normalized,
            source_facts: report.fact_counts.source_extracted,
            summary_facts: report.fact_counts.summary_extracted,
            hallucinations: report.fact_counts.hallucinations,
            total_ms: report.timings.total_ms,
            run_id: report.run_id.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    eval::logging::init(args.log_json);

    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let samples = load_sample_set(&args)?;
    println!("=== Summary Faithfulness Samples ===\n");
    println!("Samples: {}\n", samples.len());

    let evaluator = Evaluator::from_config(&config, None)?;
    let mut results = Vec::new();

    for (name, sample) in &samples {
        println!("Running {}...", name);
        let report = evaluator.evaluate(&sample.source, &sample.summary).await?;

        println!("  {}", report.summary_line());

        report.export(&config.export)?;
        results.push(SampleResult::new(name, &report));
    }

    print_results(&results);

    std::fs::create_dir_all(&args.output)?;
    let json_path = args.output.join("sample_results.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&results)?)?;
    println!("\n✅ Results saved to {}", json_path.display());

    let markdown_path = args.output.join("SAMPLES.md");
    std::fs::write(&markdown_path, markdown_table(&results))?;
    println!("✅ Table saved to {}", markdown_path.display());

    Ok(())
}

fn load_sample_set(args: &Args) -> Result<SampleSet> {
    let mut samples = if args.samples.exists() {
        eval::load_samples(&args.samples)?
    } else {
        tracing::info!(path = %args.samples.display(), "Samples file not found, using built-in samples");
        eval::builtin_samples()
    };

    if let Some(name) = &args.sample {
        let sample = samples
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown sample: {}", name))?;
        samples = SampleSet::from([(name.clone(), sample)]);
    }

    Ok(samples)
}

fn print_results(results: &[SampleResult]) {
    println!("\n=== RESULTS ===\n");
    println!(
        "{:<12} {:>8} {:>10} {:>8} {:>8} {:>8} {:>10}",
        "Sample", "Recall", "Precision", "F1", "Source", "Summary", "Halluc."
    );

    for r in results {
        println!(
            "{:<12} {:>8.3} {:>10.3} {:>8.3} {:>8} {:>8} {:>10}",
            r.name, r.recall, r.precision, r.f1, r.source_facts, r.summary_facts, r.hallucinations
        );
    }

    if !results.is_empty() {
        let n = results.len() as f64;
        let avg_f1 = results.iter().map(|r| r.f1).sum::<f64>() / n;
        println!("\n🏆 Average F1: {:.3}", avg_f1);
    }
}

fn markdown_table(results: &[SampleResult]) -> String {
    let mut content = String::from(
        "# Sample Results\n\n\
         | Sample | Recall | Precision | F1 | Source Facts | Summary Facts | Hallucinations | Time |\n\
         |--------|--------|-----------|----|--------------|---------------|----------------|------|\n",
    );

    for r in results {
        content.push_str(&format!(
            "| {} | {:.3} | {:.3} | {:.3} | {} | {} | {} | {} ms |\n",
            r.name, r.recall, r.precision, r.f1, r.source_facts, r.summary_facts, r.hallucinations, r.total_ms
        ));
    }

    content
}
