//! dblplink-eval: entity linking evaluation runner.
//!
//! Sends each DBLP-QuAD question to a running `/link_entities` endpoint and
//! scores the ranked candidates against the gold entities.
//!
//! Usage:
//!   cargo run --bin dblplink-eval -- --dataset dblp_quad/questions_test.json
//!   cargo run --bin dblplink-eval -- --dataset questions.json --limit 20 --text-match-only
//!   cargo run --bin dblplink-eval -- --dataset questions.json --output results/report.json

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::warn;

use dblplink_core::{defaults, LinkingResult};
use dblplink_search::{MetricsSummary, QuestionMetrics};

#[derive(Parser)]
#[command(name = "dblplink-eval")]
#[command(author, version, about = "Evaluate entity linking against DBLP-QuAD")]
struct Cli {
    /// DBLP-QuAD question file
    #[arg(short, long)]
    dataset: PathBuf,

    /// Entity linking endpoint
    #[arg(long, default_value = "http://localhost:5001/link_entities")]
    api_url: String,

    /// Number of questions to evaluate
    #[arg(short, long, default_value_t = defaults::EVAL_QUESTION_LIMIT)]
    limit: usize,

    /// Skip reranking and keep retrieval order
    #[arg(long)]
    text_match_only: bool,

    /// Write a JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct Dataset {
    questions: Vec<DatasetQuestion>,
}

#[derive(Deserialize)]
struct DatasetQuestion {
    question: QuestionText,
    #[serde(default)]
    entities: Vec<String>,
}

#[derive(Deserialize)]
struct QuestionText {
    string: String,
}

#[derive(Serialize)]
struct EvalReport {
    timestamp: String,
    api_url: String,
    text_match_only: bool,
    questions: usize,
    failed_questions: usize,
    gold_entities: usize,
    f1: f64,
    mrr: f64,
    hits: Vec<HitsAtK>,
    duration_ms: u64,
}

#[derive(Serialize)]
struct HitsAtK {
    k: usize,
    value: f64,
}

async fn link(
    client: &reqwest::Client,
    api_url: &str,
    question: &str,
    text_match_only: bool,
) -> anyhow::Result<LinkingResult> {
    let response = client
        .post(api_url)
        .json(&serde_json::json!({
            "question": question,
            "text_match_only": text_match_only,
        }))
        .send()
        .await
        .context("request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("API returned {}: {}", status, body);
    }
    response
        .json::<LinkingResult>()
        .await
        .context("failed to decode linking result")
}

fn print_hits(label: &str, hits: &[(usize, f64)]) {
    for (k, value) in hits {
        println!("{label}Hits@{k}: {value:.4}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let raw = std::fs::read_to_string(&cli.dataset)
        .with_context(|| format!("reading {}", cli.dataset.display()))?;
    let dataset: Dataset = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", cli.dataset.display()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("dblplink Evaluation Runner");
    println!("═══════════════════════════════════════════════════════════════");
    println!("Dataset:         {}", cli.dataset.display());
    println!("Endpoint:        {}", cli.api_url);
    println!("Questions:       {}", cli.limit.min(dataset.questions.len()));
    println!("Text match only: {}", cli.text_match_only);
    println!();

    let start = Instant::now();
    let cutoffs = defaults::EVAL_HITS_CUTOFFS;
    let mut summary = MetricsSummary::new(&cutoffs);
    let mut failed = 0usize;

    for (index, example) in dataset.questions.iter().take(cli.limit).enumerate() {
        let question = &example.question.string;
        println!("[{}] {}", index + 1, question);
        println!("  gold: {:?}", example.entities);

        let result = match link(&client, &cli.api_url, question, cli.text_match_only).await {
            Ok(result) => result,
            Err(e) => {
                warn!(question = %question, error = %e, "Skipping question");
                failed += 1;
                continue;
            }
        };

        let metrics = QuestionMetrics::evaluate(&result, &example.entities, &cutoffs);
        summary.add(&metrics);

        println!("  F1: {:.4}  MRR: {:.4}", metrics.f1, metrics.mrr);
        println!(
            "  Running F1: {:.4}  Running MRR: {:.4}",
            summary.f1(),
            summary.mrr()
        );
        print_hits("  Running ", &summary.hits());
    }

    println!();
    println!("Evaluation Results:");
    println!("F1:       {:.4}", summary.f1());
    println!("MRR:      {:.4}", summary.mrr());
    print_hits("", &summary.hits());
    if failed > 0 {
        println!("Failed:   {}", failed);
    }

    if let Some(path) = &cli.output {
        let report = EvalReport {
            timestamp: Utc::now().to_rfc3339(),
            api_url: cli.api_url.clone(),
            text_match_only: cli.text_match_only,
            questions: summary.questions,
            failed_questions: failed,
            gold_entities: summary.gold_entities,
            f1: summary.f1(),
            mrr: summary.mrr(),
            hits: summary
                .hits()
                .into_iter()
                .map(|(k, value)| HitsAtK { k, value })
                .collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
