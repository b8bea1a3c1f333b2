//! Pipeline stages for academic-paper PDF cleanup.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch an extraction backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ engine ──▶ normalize ──▶ render
//! (pdf text)  (structure) (cleanup)    (lopdf)
//! ```
//!
//! 1. [`extract`]    — PDF bytes to plain text + table grids (two backends)
//! 2. [`heuristics`] — rule-based title/abstract/section/table/equation
//!    functions; pure text in, structure out
//! 3. [`engine`]     — mode dispatch over rule-based vs. LLM-assisted, with
//!    mandatory fallback; the only stage that may touch the network
//! 4. [`llm`]        — the Anthropic transport behind [`llm::RemoteCompletion`]
//! 5. [`normalize`]  — positional span substitution and identifier stripping
//! 6. [`render`]     — the structured record to styled PDF bytes

pub mod engine;
pub mod extract;
pub mod heuristics;
pub mod llm;
pub mod normalize;
pub mod render;
