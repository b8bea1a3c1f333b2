//! Top-level processing entry points.
//!
//! This is the thin orchestrator: it owns no decision logic beyond
//! sequencing the pipeline stages and timing them. Everything interesting
//! happens in the stages it calls.
//!
//! A single document is processed synchronously — one stage at a time, one
//! LLM call at a time. Batch processing is a set of fully independent
//! single-document runs sharing no mutable state, which is why
//! [`process_batch`] can fan them out concurrently without coordination.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::config::ProcessConfig;
use crate::document::{ExtractedDocument, ProcessOutput, ProcessStats};
use crate::error::ProcessError;
use crate::pipeline::engine::ExtractionEngine;
use crate::pipeline::extract::PdfExtractor;
use crate::pipeline::{heuristics, normalize, render};

/// Clean and reformat a paper, returning the structured record, the
/// rendered PDF bytes and run statistics.
///
/// # Errors
/// Only terminal failures surface here (see [`ProcessError`]): unreadable
/// input, both extraction backends failing, or a renderer failure. All
/// LLM-assisted extraction errors are absorbed by rule-based fallback.
pub async fn process(
    input: impl AsRef<Path>,
    config: &ProcessConfig,
) -> Result<ProcessOutput, ProcessError> {
    let total_start = Instant::now();
    let (document, mut stats) = build_document(input.as_ref(), config).await?;

    // ── Render ───────────────────────────────────────────────────────────
    let render_start = Instant::now();
    let pdf = render::render(&document, &config.style)?;
    stats.render_duration_ms = render_start.elapsed().as_millis() as u64;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "processed '{}': {} sections, {} tables, {} equations in {}ms",
        input.as_ref().display(),
        stats.sections,
        stats.tables,
        stats.equations,
        stats.total_duration_ms
    );

    Ok(ProcessOutput {
        document,
        pdf,
        stats,
    })
}

/// Process a paper and write the cleaned PDF to `output_path`.
///
/// Uses an atomic write (temp file + rename) so a terminal error never
/// leaves a partial output file behind.
pub async fn process_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ProcessConfig,
) -> Result<ProcessStats, ProcessError> {
    let output = process(input, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProcessError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .map_err(|e| ProcessError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ProcessError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Extract the structured record without rendering.
///
/// Useful for `--inspect-only` / `--json` flows; `pdf` in the returned
/// output is empty.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &ProcessConfig,
) -> Result<ProcessOutput, ProcessError> {
    let total_start = Instant::now();
    let (document, mut stats) = build_document(input.as_ref(), config).await?;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(ProcessOutput {
        document,
        pdf: Vec::new(),
        stats,
    })
}

/// Synchronous wrapper around [`process_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ProcessConfig,
) -> Result<ProcessStats, ProcessError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ProcessError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_to_file(input, output_path, config))
}

/// Outcome of one document in a batch run.
#[derive(Debug)]
pub struct BatchResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<ProcessStats, ProcessError>,
}

/// Process several papers independently, writing each result into
/// `out_dir` as `<stem>.tidy.pdf`.
///
/// Documents share no state, so up to `jobs` of them run concurrently; a
/// failure in one never affects the others.
pub async fn process_batch(
    inputs: Vec<PathBuf>,
    out_dir: &Path,
    config: &ProcessConfig,
    jobs: usize,
) -> Vec<BatchResult> {
    stream::iter(inputs.into_iter().map(|input| {
        let config = config.clone();
        let out_dir = out_dir.to_path_buf();
        async move {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            let output = out_dir.join(format!("{stem}.tidy.pdf"));
            let result = process_to_file(&input, &output, &config).await;
            BatchResult {
                input,
                output,
                result,
            }
        }
    }))
    .buffer_unordered(jobs.max(1))
    .collect()
    .await
}

// ── Internal pipeline ────────────────────────────────────────────────────

/// Run extraction + structure inference for one document.
async fn build_document(
    path: &Path,
    config: &ProcessConfig,
) -> Result<(ExtractedDocument, ProcessStats), ProcessError> {
    let mut stats = ProcessStats::default();
    let patterns = &config.patterns;

    // ── Step 1: Read and validate input ──────────────────────────────────
    let bytes = read_pdf_bytes(path).await?;

    // ── Step 2: Extract text + tables ────────────────────────────────────
    // CPU-bound parsing; keep it off the async executor's hot path.
    let extract_start = Instant::now();
    let owned_path = path.to_path_buf();
    let raw = tokio::task::spawn_blocking(move || {
        PdfExtractor::default().extract(&bytes, &owned_path)
    })
    .await
    .map_err(|e| ProcessError::Internal(format!("extraction task panicked: {e}")))??;
    stats.extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    stats.tables = raw.tables.len();
    info!(
        "extracted {} chars and {} tables from '{}'",
        raw.text.len(),
        raw.tables.len(),
        path.display()
    );

    // ── Step 3: Build the engine for this run ────────────────────────────
    let engine = ExtractionEngine::new(config);

    // ── Step 4: Title (from the full text, before front matter goes) ─────
    let title = engine.title(&raw.text).await;
    debug!("title: {title:?}");

    // ── Step 5: Drop front matter ────────────────────────────────────────
    let body = heuristics::remove_before_abstract(&raw.text, patterns);

    // ── Step 6: Describe equations and tables ────────────────────────────
    let spans = heuristics::find_equation_spans(body, patterns);
    stats.equations = spans.len();
    let mut equations = Vec::with_capacity(spans.len());
    for span in spans {
        let description = engine.describe_equation(&body[span.clone()]).await;
        equations.push((span, description));
    }

    let mut table_descriptions = Vec::with_capacity(raw.tables.len());
    for table in &raw.tables {
        table_descriptions.push(engine.describe_table(table).await);
    }

    // ── Step 7: Normalize ────────────────────────────────────────────────
    let cleaned = normalize::normalize(body, &equations, &table_descriptions, patterns);

    // ── Step 8: Abstract + sections from the cleaned text ────────────────
    let abstract_text = heuristics::extract_abstract(&cleaned, patterns);
    let mut sections = engine.sections(&cleaned).await;
    // The abstract is carried separately; an LLM parse may still emit it as
    // a section, so drop any such leftover for a consistent record.
    sections.retain(|s| !patterns.abstract_marker_re.is_match(&s.heading));
    stats.sections = sections.len();

    stats.llm_calls = engine.llm_calls();
    stats.llm_fallbacks = engine.llm_fallbacks();

    Ok((
        ExtractedDocument {
            title,
            abstract_text,
            sections,
        },
        stats,
    ))
}

/// Read the input file, mapping I/O failures to actionable errors and
/// rejecting non-PDF content before any parsing happens.
async fn read_pdf_bytes(path: &Path) -> Result<Vec<u8>, ProcessError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProcessError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ProcessError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(ProcessError::Internal(format!(
                "failed to read '{}': {e}",
                path.display()
            )))
        }
    };

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        for (i, b) in bytes.iter().take(4).enumerate() {
            magic[i] = *b;
        }
        return Err(ProcessError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = read_pdf_bytes(Path::new("/no/such/file.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_bytes_rejected_by_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.pdf");
        tokio::fs::write(&path, b"hello world").await.unwrap();
        let err = read_pdf_bytes(&path).await.unwrap_err();
        match err {
            ProcessError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn process_rejects_missing_input_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        let config = ProcessConfig::default();
        let result = process_to_file("/no/such/file.pdf", &out, &config).await;
        assert!(result.is_err());
        assert!(!out.exists(), "no partial output may be written");
    }
}
