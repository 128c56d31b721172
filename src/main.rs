// NewsCheck CLI
// Classify one document as REAL or FAKE and report how the verdict was reached

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use newscheck_lib::models::{DocumentReport, StageTimings};
use newscheck_lib::services::config_store::{AppConfig, ConfigStore, OracleKind};
use newscheck_lib::services::detection::{build_detector, WindowParams};
use newscheck_lib::services::text_processor::load_document;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OracleArg {
    Http,
    Onnx,
}

impl From<OracleArg> for OracleKind {
    fn from(arg: OracleArg) -> Self {
        match arg {
            OracleArg::Http => OracleKind::Http,
            OracleArg::Onnx => OracleKind::Onnx,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document to classify (.pdf or plain text)
    file: PathBuf,

    /// Config directory (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Classification backend
    #[arg(long, value_enum)]
    oracle: Option<OracleArg>,

    /// Inference endpoint for the http oracle
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory with model.onnx, tokenizer.json and config.json
    #[arg(long, env = "NEWSCHECK_MODEL")]
    model_dir: Option<PathBuf>,

    /// tokenizer.json used to build windows
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Tokens per window
    #[arg(long)]
    max_len: Option<usize>,

    /// Tokens between window starts
    #[arg(long)]
    stride: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to this path
    #[arg(long)]
    out: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<(AppConfig, Option<ConfigStore>)> {
    let store = args
        .config
        .clone()
        .or_else(ConfigStore::default_config_dir)
        .map(ConfigStore::new);
    let mut config = match &store {
        Some(store) => store
            .load()
            .with_context(|| format!("loading {}", store.config_file().display()))?,
        None => AppConfig::default(),
    };

    if let Some(kind) = args.oracle {
        config.oracle.kind = kind.into();
    }
    if let Some(endpoint) = &args.endpoint {
        config.oracle.endpoint = Some(endpoint.clone());
    }
    if let Some(dir) = &args.model_dir {
        config.oracle.model_dir = Some(dir.clone());
    }
    if let Some(path) = &args.tokenizer {
        config.oracle.tokenizer_path = Some(path.clone());
    }
    if args.max_len.is_some() || args.stride.is_some() {
        let max_len = args.max_len.unwrap_or(config.windowing.max_len());
        let stride = args.stride.unwrap_or(config.windowing.stride());
        config.windowing = WindowParams::new(max_len, stride)?;
    }

    Ok((config, store))
}

fn print_report(report: &DocumentReport, winning_label: Option<&str>) {
    println!("File:       {}", report.file_name.as_deref().unwrap_or("-"));
    println!("Verdict:    {}", report.outcome.display_label());
    println!("Confidence: {}%", report.outcome.confidence());
    println!("Windows:    {}", report.window_count);
    if let Some(label) = winning_label {
        println!("Winner:     {}", label);
    }
    for entry in report.distribution.iter() {
        println!("  {:<24} {:.4}", entry.label, entry.score);
    }
    println!(
        "Timing:     extract {} ms, infer {} ms, total {} ms",
        report.timings.extract_ms, report.timings.infer_ms, report.timings.total_ms
    );
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    newscheck_lib::init_logging();

    let args = Args::parse();
    let (config, store) = load_config(&args)?;
    let detector = build_detector(&config, store.as_ref())?;

    let t_total = Instant::now();
    let t_extract = Instant::now();
    let document = load_document(&args.file)?;
    let extract_ms = t_extract.elapsed().as_millis() as u64;

    let t_infer = Instant::now();
    let analysis = detector.analyze_document(&document.text).await;
    let infer_ms = t_infer.elapsed().as_millis() as u64;

    let report = DocumentReport {
        run_id: Uuid::new_v4(),
        classified_at: chrono::Utc::now().to_rfc3339(),
        file_name: Some(document.file_name),
        file_size: Some(document.file_size),
        outcome: analysis.outcome,
        window_count: analysis.window_count,
        distribution: analysis.distribution,
        timings: StageTimings {
            extract_ms,
            infer_ms,
            total_ms: t_total.elapsed().as_millis() as u64,
        },
    };

    info!(
        run_id = %report.run_id,
        verdict = %report.outcome.display_label(),
        confidence = report.outcome.confidence(),
        extract_ms = report.timings.extract_ms,
        infer_ms = report.timings.infer_ms,
        total_ms = report.timings.total_ms,
        "[RUN] report ready"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, analysis.winning_label.as_deref());
    }

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
        info!(path = %out.display(), "[RUN] report written");
    }

    if report.outcome.is_failure() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
