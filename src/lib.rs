//! # papertidy
//!
//! Clean and reformat academic paper PDFs.
//!
//! ## What it does
//!
//! Takes a paper as exported by publishers or preprint servers — front
//! matter, running headers, URLs, LaTeX leftovers and all — and produces a
//! readable PDF: title centered, authors/affiliations stripped, abstract
//! preserved, body reorganized into detected sections, tables and equations
//! replaced by plain-text descriptions, and every URL/DOI/email removed.
//!
//! The interesting part is structure inference over an unstructured text
//! blob. PDF parsing and PDF generation are collaborators behind narrow
//! interfaces; the core is the heuristics (and their LLM-assisted
//! alternative) in between.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    text + table grids (pdf-extract, lopdf fallback)
//!  ├─ 2. Title      first plausible line, or one small LLM call
//!  ├─ 3. Trim       drop everything before the abstract marker
//!  ├─ 4. Describe   tables and equations → plain-text placeholders
//!  ├─ 5. Normalize  positional substitution, strip URLs/DOIs/emails
//!  ├─ 6. Sections   heading-shape classifier (or one large LLM call)
//!  └─ 7. Render     styled PDF via lopdf (centered title, justified body)
//! ```
//!
//! ## Modes
//!
//! Without an API key every step is rule-based and fully offline. With
//! `ANTHROPIC_API_KEY` set (or an explicit key in the config) the title,
//! section structure and table/equation descriptions are delegated to the
//! model — and every single call falls back to the rule-based
//! implementation on any failure, so LLM-assisted mode can never do worse
//! than rule-based mode on availability.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use papertidy::{process_to_file, ProcessConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Mode picked from ANTHROPIC_API_KEY presence; absence = rule-based.
//!     let config = ProcessConfig::from_env();
//!     let stats = process_to_file("paper.pdf", "paper.tidy.pdf", &config).await?;
//!     eprintln!("{} sections, {} LLM fallbacks", stats.sections, stats.llm_fallbacks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `papertidy` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! papertidy = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod patterns;
pub mod pipeline;
pub mod process;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Alignment, Margins, Mode, PageSize, ProcessConfig, ProcessConfigBuilder, RoleStyle, StyleConfig};
pub use document::{ExtractedDocument, ProcessOutput, ProcessStats, RawDocument, RawTable, Section};
pub use error::{ExtractionError, ProcessError, RemoteCallError, RenderError};
pub use patterns::{PatternLibrary, PatternLibraryBuilder};
pub use pipeline::llm::RemoteCompletion;
pub use process::{inspect, process, process_batch, process_sync, process_to_file, BatchResult};
