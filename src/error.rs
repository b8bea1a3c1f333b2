//! Error types for the papertidy library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`ProcessError`] — **Fatal**: the run cannot produce an output file at
//!   all (unreadable input, both extraction backends failed, renderer
//!   rejected the style). Returned as `Err(ProcessError)` from the top-level
//!   `process*` functions. No partial output file is ever left behind.
//!
//! * [`RemoteCallError`] — **Recovered**: a single LLM-assisted call failed
//!   (timeout, HTTP error, empty or malformed response). Never propagated
//!   past the call site; the engine resolves it by substituting the
//!   rule-based result for that one call.
//!
//! * [`RenderError`] — **Fatal**, but scoped to the renderer collaborator so
//!   its callers and tests don't need the whole top-level taxonomy.
//!
//! The separation encodes the recovery policy in the types: anything a
//! caller can see is terminal, everything else has already been absorbed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the papertidy library.
///
/// LLM call failures use [`RemoteCallError`] and are resolved internally by
/// rule-based fallback rather than propagated here.
#[derive(Debug, Error)]
pub enum ProcessError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Neither extraction backend could read the document.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The renderer could not produce output.
    #[error(transparent)]
    Render(#[from] RenderError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Both extraction backends failed to read the PDF.
///
/// Terminal: with no text layer there is nothing for the heuristics to
/// work on, so the run aborts without producing output.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The primary and fallback backends both returned errors.
    #[error(
        "Could not extract text from '{path}'.\n\
         primary backend: {primary}\n\
         fallback backend: {fallback}\n\
         The PDF may be encrypted, corrupt, or image-only (scanned without OCR)."
    )]
    AllBackendsFailed {
        path: PathBuf,
        primary: String,
        fallback: String,
    },

    /// Extraction succeeded but produced no text at all.
    #[error("PDF '{path}' has no extractable text layer (scanned image-only document?)")]
    NoTextLayer { path: PathBuf },
}

/// The renderer could not produce PDF bytes.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Style configuration is internally inconsistent.
    #[error("Invalid style configuration: {0}")]
    InvalidStyle(String),

    /// lopdf failed while assembling the document.
    #[error("PDF assembly failed: {0}")]
    Assembly(String),
}

/// A recovered failure of a single LLM-assisted call.
///
/// Every variant is resolved at the call site by falling back to the
/// rule-based implementation for that call; subsequent calls in the same run
/// still attempt the LLM (each call is an independent trial).
#[derive(Debug, Clone, Error)]
pub enum RemoteCallError {
    /// Transport-level failure (connection refused, DNS, TLS).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The call exceeded the configured timeout.
    #[error("API call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Non-success HTTP status from the API.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The API responded but with no usable text content.
    #[error("API returned an empty response")]
    Empty,

    /// The response body could not be parsed into the expected shape.
    #[error("Malformed API response: {0}")]
    Malformed(String),
}
