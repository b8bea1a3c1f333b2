//! Text/table extraction: the first collaborator boundary.
//!
//! Everything downstream works on plain text, so this module's only job is
//! turning PDF bytes into a [`RawDocument`]. Two interchangeable backends
//! sit behind [`PdfBackend`]:
//!
//! * **primary** — the `pdf-extract` crate, which handles the common case of
//!   born-digital PDFs with a proper text layer;
//! * **fallback** — page-wise extraction through `lopdf`, which survives
//!   some documents that trip up the primary (odd font encodings, partially
//!   damaged xref tables).
//!
//! Only when *both* backends fail does extraction become a terminal
//! [`ExtractionError`] — there is nothing left to run heuristics on.
//!
//! ## Table recovery
//!
//! Neither backend reports table geometry, so grids are recovered from the
//! text itself: runs of two or more consecutive lines whose cells are
//! separated by multi-space gaps (or pipes) are read as rows. Page
//! attribution comes from form-feed page breaks when the backend emits
//! them, else page 0. Both are documented approximations — good enough to
//! describe a grid, not to reconstruct its exact layout.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::{RawDocument, RawTable};
use crate::error::ExtractionError;

/// Minimum consecutive grid-like lines to accept as a table.
const TABLE_MIN_ROWS: usize = 2;

/// Minimum cells per row for a line to read as a table row.
const TABLE_MIN_COLS: usize = 2;

static CELL_GAP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}|\t+| \| ").unwrap());

/// A single backend's failure, carried into
/// [`ExtractionError::AllBackendsFailed`] when no backend succeeds.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Trait for PDF text extraction backends.
///
/// Implementors provide only the low-level text step; table recovery and
/// the downstream structure inference live outside the backends so they
/// behave identically regardless of which backend produced the text.
pub trait PdfBackend: Send + Sync {
    /// Short name for log lines and error messages.
    fn name(&self) -> &'static str;

    /// Extract the full text content from PDF bytes.
    fn extract_text(&self, bytes: &[u8]) -> Result<String, BackendError>;
}

/// Primary backend: the `pdf-extract` crate.
pub struct PdfExtractBackend;

impl PdfBackend for PdfExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<String, BackendError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| BackendError(e.to_string()))
    }
}

/// Fallback backend: page-wise extraction through `lopdf`.
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<String, BackendError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| BackendError(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(BackendError("document is encrypted".into()));
        }

        let mut pages: Vec<String> = Vec::new();
        for (page_num, _) in doc.get_pages() {
            match doc.extract_text(&[page_num]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    warn!("lopdf: page {page_num} text extraction failed: {e}");
                    pages.push(String::new());
                }
            }
        }
        if pages.is_empty() {
            return Err(BackendError("document has no pages".into()));
        }
        // Form feeds keep page attribution available to table recovery.
        Ok(pages.join("\u{c}"))
    }
}

/// Two-backend extractor producing the pipeline's [`RawDocument`].
pub struct PdfExtractor {
    primary: Box<dyn PdfBackend>,
    fallback: Box<dyn PdfBackend>,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self {
            primary: Box::new(PdfExtractBackend),
            fallback: Box::new(LopdfBackend),
        }
    }
}

impl PdfExtractor {
    /// Build an extractor with explicit backends (tests use stubs here).
    pub fn with_backends(primary: Box<dyn PdfBackend>, fallback: Box<dyn PdfBackend>) -> Self {
        Self { primary, fallback }
    }

    /// Extract text and tables from PDF bytes.
    ///
    /// `path` is only used in error messages.
    pub fn extract(&self, bytes: &[u8], path: &Path) -> Result<RawDocument, ExtractionError> {
        let text = match self.primary.extract_text(bytes) {
            Ok(text) => text,
            Err(primary_err) => {
                warn!(
                    "{} failed ({primary_err}), trying {}",
                    self.primary.name(),
                    self.fallback.name()
                );
                match self.fallback.extract_text(bytes) {
                    Ok(text) => text,
                    Err(fallback_err) => {
                        return Err(ExtractionError::AllBackendsFailed {
                            path: path.to_path_buf(),
                            primary: primary_err.to_string(),
                            fallback: fallback_err.to_string(),
                        });
                    }
                }
            }
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::NoTextLayer {
                path: path.to_path_buf(),
            });
        }

        let tables = recover_tables(&text);
        debug!(
            "extracted {} chars, {} tables",
            text.len(),
            tables.len()
        );
        Ok(RawDocument { text, tables })
    }
}

// ── Table recovery ───────────────────────────────────────────────────────

/// Split a line into cells on multi-space gaps, tabs, or pipes.
///
/// `None` when the line doesn't read as a table row.
fn split_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim().trim_matches('|').trim();
    if trimmed.is_empty() {
        return None;
    }
    let cells: Vec<String> = CELL_GAP_RE
        .split(trimmed)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if cells.len() >= TABLE_MIN_COLS {
        Some(cells)
    } else {
        None
    }
}

/// Recover rectangular table grids from extracted text.
fn recover_tables(text: &str) -> Vec<RawTable> {
    let mut tables = Vec::new();
    let mut block: Vec<Vec<String>> = Vec::new();
    let mut block_start = 0usize;
    let mut offset = 0usize;

    let mut flush = |block: &mut Vec<Vec<String>>, start: usize, tables: &mut Vec<RawTable>| {
        if block.len() >= TABLE_MIN_ROWS {
            let cols = block.iter().map(Vec::len).max().unwrap_or(0);
            let rows = block
                .drain(..)
                .map(|mut row| {
                    row.resize(cols, String::new());
                    row
                })
                .collect();
            tables.push(RawTable {
                page: text[..start].matches('\u{c}').count(),
                index: tables.len(),
                rows,
            });
        } else {
            block.clear();
        }
    };

    for line in text.split('\n') {
        match split_cells(line) {
            Some(cells) => {
                if block.is_empty() {
                    block_start = offset;
                }
                block.push(cells);
            }
            None => flush(&mut block, block_start, &mut tables),
        }
        offset += line.len() + 1;
    }
    flush(&mut block, block_start, &mut tables);

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct StubBackend(Result<&'static str, &'static str>);

    impl PdfBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn extract_text(&self, _bytes: &[u8]) -> Result<String, BackendError> {
            self.0
                .map(str::to_string)
                .map_err(|e| BackendError(e.to_string()))
        }
    }

    fn path() -> PathBuf {
        PathBuf::from("paper.pdf")
    }

    #[test]
    fn primary_success_skips_fallback() {
        let extractor = PdfExtractor::with_backends(
            Box::new(StubBackend(Ok("some text"))),
            Box::new(StubBackend(Err("should not be reached"))),
        );
        let doc = extractor.extract(b"%PDF", &path()).unwrap();
        assert_eq!(doc.text, "some text");
    }

    #[test]
    fn fallback_used_when_primary_fails() {
        let extractor = PdfExtractor::with_backends(
            Box::new(StubBackend(Err("font table corrupt"))),
            Box::new(StubBackend(Ok("recovered text"))),
        );
        let doc = extractor.extract(b"%PDF", &path()).unwrap();
        assert_eq!(doc.text, "recovered text");
    }

    #[test]
    fn both_backends_failing_is_terminal() {
        let extractor = PdfExtractor::with_backends(
            Box::new(StubBackend(Err("bad xref"))),
            Box::new(StubBackend(Err("encrypted"))),
        );
        let err = extractor.extract(b"%PDF", &path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad xref"));
        assert!(msg.contains("encrypted"));
    }

    #[test]
    fn empty_text_is_no_text_layer() {
        let extractor = PdfExtractor::with_backends(
            Box::new(StubBackend(Ok("   \n  "))),
            Box::new(StubBackend(Ok(""))),
        );
        let err = extractor.extract(b"%PDF", &path()).unwrap_err();
        assert!(matches!(err, ExtractionError::NoTextLayer { .. }));
    }

    #[test]
    fn grid_lines_recovered_as_table() {
        let text = "Intro prose.\n\nName    Score\nA       1\nB       2\n\nMore prose follows here.";
        let tables = recover_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 3);
        assert_eq!(tables[0].rows[0], vec!["Name", "Score"]);
        assert_eq!(tables[0].rows[2], vec!["B", "2"]);
    }

    #[test]
    fn single_grid_line_is_not_a_table() {
        let text = "prose\nName    Score\nmore prose";
        assert!(recover_tables(text).is_empty());
    }

    #[test]
    fn plain_prose_yields_no_tables() {
        let text = "This is a paragraph of flowing text. It has single spaces only.\nAnd another line of the same.";
        assert!(recover_tables(text).is_empty());
    }

    #[test]
    fn ragged_rows_padded_rectangular() {
        let text = "A    B    C\nx    y\n";
        let tables = recover_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[1], vec!["x", "y", ""]);
        assert_eq!(tables[0].column_count(), 3);
    }

    #[test]
    fn page_attribution_from_form_feeds() {
        let text = "page one prose\u{c}second page\nName    Score\nA       1\n";
        let tables = recover_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 1);
    }

    #[test]
    fn pipe_separated_rows() {
        let text = "| Name | Score |\n| A | 1 |\n";
        let tables = recover_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0], vec!["Name", "Score"]);
    }
}
