//! CLI binary for papertidy.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use papertidy::{process_batch, process_to_file, ProcessConfig, inspect, Mode, PageSize, StyleConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean one paper (writes paper.tidy.pdf next to the current directory)
  papertidy paper.pdf

  # Explicit output path
  papertidy paper.pdf -o cleaned.pdf

  # Batch: clean a whole directory's worth, four at a time
  papertidy --out-dir cleaned/ --jobs 4 papers/*.pdf

  # Force rule-based mode even when a key is configured
  papertidy --no-llm paper.pdf

  # Show the inferred structure without rendering
  papertidy --inspect-only --json paper.pdf

MODES:
  With ANTHROPIC_API_KEY set, the title, section structure and table/
  equation descriptions are delegated to the model; every call falls back
  to the rule-based heuristics on any failure. Without a key the whole run
  is rule-based and fully offline. The key's absence is not an error.

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY    Selects LLM-assisted mode when present
  PAPERTIDY_MODEL      Override the model ID
"#;

/// Clean and reformat academic paper PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "papertidy",
    version,
    about = "Clean and reformat academic paper PDFs",
    long_about = "Strip front matter, detect sections, replace tables and equations with \
plain-text descriptions, remove URLs/DOIs/emails, and re-render the paper as a clean PDF. \
Works fully offline; an Anthropic API key optionally upgrades extraction quality.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file(s). More than one input requires --out-dir.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the cleaned PDF to this path (single input only).
    #[arg(short, long, env = "PAPERTIDY_OUTPUT")]
    output: Option<PathBuf>,

    /// Output directory for batch runs; files are named <stem>.tidy.pdf.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Concurrent documents in batch mode.
    #[arg(short, long, env = "PAPERTIDY_JOBS", default_value_t = 1)]
    jobs: usize,

    /// Force rule-based mode even when an API key is present.
    #[arg(long, env = "PAPERTIDY_NO_LLM")]
    no_llm: bool,

    /// Model ID for LLM-assisted mode.
    #[arg(long, env = "PAPERTIDY_MODEL")]
    model: Option<String>,

    /// Per-LLM-call timeout in seconds.
    #[arg(long, env = "PAPERTIDY_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Output page size: letter or a4.
    #[arg(long, env = "PAPERTIDY_PAGE_SIZE", value_enum, default_value = "letter")]
    page_size: PageSizeArg,

    /// Print the inferred structure instead of rendering a PDF.
    #[arg(long)]
    inspect_only: bool,

    /// Emit JSON (with --inspect-only: the structured record and stats).
    #[arg(long, env = "PAPERTIDY_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPERTIDY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPERTIDY_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PageSizeArg {
    Letter,
    A4,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::A4 => PageSize::A4,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    if !cli.quiet {
        let mode = match config.mode {
            Mode::RuleBased => "rule-based (offline)",
            Mode::LlmAssisted => "LLM-assisted",
        };
        eprintln!("{}", dim(&format!("mode: {mode}")));
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = single_input(&cli)?;
        let output = inspect(input, &config).await.context("Inspection failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else {
            println!("Title:     {}", output.document.title);
            if !output.document.abstract_text.is_empty() {
                println!("Abstract:  {} chars", output.document.abstract_text.len());
            }
            println!("Sections:  {}", output.document.sections.len());
            for section in &output.document.sections {
                println!("  - {}", section.heading);
            }
            println!("Tables:    {}", output.stats.tables);
            println!("Equations: {}", output.stats.equations);
        }
        return Ok(());
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    if cli.inputs.len() > 1 || cli.out_dir.is_some() {
        return run_batch(&cli, &config).await;
    }

    // ── Single document ──────────────────────────────────────────────────
    let input = single_input(&cli)?;
    let output_path = match &cli.output {
        Some(path) => path.clone(),
        None => default_output(input),
    };

    let stats = process_to_file(input, &output_path, &config)
        .await
        .context("Processing failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} sections, {} tables, {} equations  {}ms  →  {}",
            green("✔"),
            stats.sections,
            stats.tables,
            stats.equations,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.llm_calls > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} LLM calls, {} fell back to rules",
                    stats.llm_calls, stats.llm_fallbacks
                ))
            );
        }
    }

    Ok(())
}

async fn run_batch(cli: &Cli, config: &ProcessConfig) -> Result<()> {
    let out_dir = cli
        .out_dir
        .clone()
        .context("Batch runs (multiple inputs) require --out-dir")?;
    if cli.output.is_some() {
        anyhow::bail!("-o/--output only applies to a single input; use --out-dir for batches");
    }

    let bar = if cli.quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Processing");
        bar.set_message(format!("{} documents…", cli.inputs.len()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let results = process_batch(cli.inputs.clone(), &out_dir, config, cli.jobs).await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let mut failed = 0usize;
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    for r in &results {
        match &r.result {
            Ok(stats) => {
                if !cli.quiet {
                    writeln!(
                        handle,
                        "  {} {}  {} sections  {}ms",
                        green("✓"),
                        r.output.display(),
                        stats.sections,
                        stats.total_duration_ms,
                    )
                    .ok();
                }
            }
            Err(e) => {
                failed += 1;
                writeln!(handle, "  {} {}  {}", red("✗"), r.input.display(), red(&e.to_string())).ok();
            }
        }
    }

    if !cli.quiet {
        let ok = results.len() - failed;
        eprintln!(
            "{} {}/{} documents cleaned",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&ok.to_string()),
            results.len(),
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} document(s) failed");
    }
    Ok(())
}

/// Map CLI args to `ProcessConfig`.
fn build_config(cli: &Cli) -> Result<ProcessConfig> {
    // Mode comes from the environment (credential presence), then flags.
    let mut config = ProcessConfig::from_env();

    if cli.no_llm {
        config.mode = Mode::RuleBased;
    }
    if let Some(ref model) = cli.model {
        config.model = model.clone();
    }
    config.api_timeout_secs = cli.api_timeout.max(1);
    config.style = StyleConfig {
        page_size: cli.page_size.clone().into(),
        ..StyleConfig::default()
    };

    Ok(config)
}

fn single_input(cli: &Cli) -> Result<&PathBuf> {
    if cli.inputs.len() != 1 {
        anyhow::bail!("This operation takes exactly one input file");
    }
    Ok(&cli.inputs[0])
}

fn default_output(input: &PathBuf) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}.tidy.pdf"))
}
