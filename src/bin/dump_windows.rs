use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use newscheck_lib::services::detection::{build_windows, WindowParams, DEFAULT_MAX_LEN, DEFAULT_STRIDE};
use newscheck_lib::services::text_processor::load_document;
use newscheck_lib::services::tokenizer::HfTokenizer;

/// Show how a document is cut into classifier windows.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document to split (.pdf or plain text)
    path: PathBuf,

    /// tokenizer.json used to build windows
    #[arg(long, env = "NEWSCHECK_TOKENIZER")]
    tokenizer: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
    max_len: usize,

    #[arg(long, default_value_t = DEFAULT_STRIDE)]
    stride: usize,

    /// Windows to print
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Write every window as JSON to this path
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowDump {
    file: String,
    max_len: usize,
    stride: usize,
    windows: Vec<newscheck_lib::services::detection::Window>,
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn main() -> Result<()> {
    newscheck_lib::init_console_only_logging(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    );

    let args = Args::parse();
    let params = WindowParams::new(args.max_len, args.stride)?;
    let codec = HfTokenizer::from_file(&args.tokenizer)?;
    let document = load_document(&args.path)?;
    let windows = build_windows(&codec, &document.text, params)?;

    println!("File: {}", args.path.display());
    println!("Extracted: {} chars ({} bytes)", document.text.chars().count(), document.text.len());
    println!(
        "Windows: {} (max_len={}, stride={}, overlap={})",
        windows.len(),
        params.max_len(),
        params.stride(),
        params.overlap()
    );

    for (i, window) in windows.iter().take(args.limit).enumerate() {
        println!(
            "[W{:04}] tokens=[{},{}) len={} {}",
            i,
            window.span.start,
            window.span.end,
            window.span.len(),
            preview(&window.text, 80)
        );
    }
    if windows.len() > args.limit {
        println!("... {} more", windows.len() - args.limit);
    }

    if let Some(out) = &args.out {
        let dump = WindowDump {
            file: document.file_name,
            max_len: params.max_len(),
            stride: params.stride(),
            windows,
        };
        let json = serde_json::to_string_pretty(&dump)?;
        std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
        println!("Wrote: {}", out.display());
    }

    Ok(())
}
