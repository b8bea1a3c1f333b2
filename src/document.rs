//! Data model for a single processing run.
//!
//! Every type here is created fresh per invocation and never mutated after
//! construction — cleaned variants are built as new values, not edited in
//! place. Nothing is shared between documents, which is what makes batch
//! runs trivially parallel (see [`crate::process::process_batch`]).

use serde::{Deserialize, Serialize};

/// The raw material produced by the extractor collaborator: the full text
/// layer plus any table grids recovered from it.
///
/// Immutable once produced; the whole pipeline downstream reads from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Full plain text of the PDF, pages joined in order.
    pub text: String,
    /// Recovered tables, in document order.
    pub tables: Vec<RawTable>,
}

/// A raw table grid as recovered by the extractor.
///
/// Rectangular: every row has the same number of cells (short rows are
/// padded with empty strings at extraction time). The first row is
/// conventionally a header but nothing enforces that — the describer applies
/// its own header heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTable {
    /// 0-indexed page the table was found on. 0 when the backend does not
    /// report page breaks (documented approximation).
    pub page: usize,
    /// 0-indexed position of the table within the document.
    pub index: usize,
    /// Row-major cell grid; cells may be empty strings.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Number of columns, taken from the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// The structured record inferred from the raw text — the core's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Paper title. Non-empty whenever the input text was non-empty.
    pub title: String,
    /// Abstract body, with the "Abstract" heading token stripped. Empty when
    /// the paper has no labeled abstract (a valid outcome, not an error).
    pub abstract_text: String,
    /// Body sections in first-occurrence order. May be empty — the renderer
    /// then emits a title/abstract-only document.
    pub sections: Vec<Section>,
}

/// One detected section: a heading plus its body text.
///
/// Headings are unique in practice but not enforced unique; consecutive
/// duplicates become separate sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
}

impl Section {
    pub fn new(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }
}

/// Result of a full processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutput {
    /// The structured record the PDF was rendered from.
    pub document: ExtractedDocument,
    /// The rendered PDF bytes. Empty when the run was inspect-only.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    /// Counters and timings for the run.
    pub stats: ProcessStats,
}

/// Counters and timings for one processing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessStats {
    /// Tables recovered by the extractor.
    pub tables: usize,
    /// Equation spans detected in the body text.
    pub equations: usize,
    /// Sections detected after normalization.
    pub sections: usize,
    /// LLM calls attempted (0 in rule-based mode).
    pub llm_calls: u32,
    /// LLM calls that fell back to the rule-based implementation.
    pub llm_fallbacks: u32,
    /// Wall-clock milliseconds spent in the extractor.
    pub extract_duration_ms: u64,
    /// Wall-clock milliseconds spent in the renderer.
    pub render_duration_ms: u64,
    /// Total wall-clock milliseconds for the run.
    pub total_duration_ms: u64,
}
