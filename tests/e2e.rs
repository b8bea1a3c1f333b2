//! End-to-end tests for the papertidy pipeline.
//!
//! The PDF fixtures are generated with lopdf inside the tests — one text
//! line per `Tj` at decreasing y positions — so the suite needs no binary
//! fixture files and exercises the real extraction backends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use papertidy::pipeline::{heuristics, normalize};
use papertidy::{
    inspect, process, process_batch, process_to_file, Mode, PatternLibrary, ProcessConfig,
    ProcessError, RemoteCallError, RemoteCompletion, Section,
};

// ── Fixture helpers ──────────────────────────────────────────────────────

/// Build a single-page PDF whose text layer is exactly `lines`, top-down.
fn source_paper_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut operations = Vec::new();
    let mut y = 720.0_f32;
    for line in lines {
        if !line.is_empty() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(72.0_f32.into()), Object::Real(y.into())],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(line.as_bytes().to_vec(), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        y -= 16.0;
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

const PAPER_LINES: &[&str] = &[
    "A Study of Paper Cleaning",
    "",
    "John Doe, Jane Roe",
    "University X, jane.roe@univ-x.edu",
    "",
    "Abstract",
    "This is the abstract.",
    "",
    "1. Introduction",
    "Some intro text. Visit https://example.com/paper for details.",
    "",
    "2. Methods",
    "The relation $E = mc^2$ is used throughout.",
];

fn write_fixture(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source_paper_pdf(PAPER_LINES)).unwrap();
    path
}

/// Transport that fails every call, for the fallback property.
struct FailingTransport;

impl RemoteCompletion for FailingTransport {
    fn complete(
        &self,
        _prompt: String,
        _max_tokens: u32,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, RemoteCallError>> + Send + '_>,
    > {
        Box::pin(async { Err(RemoteCallError::Http("connection refused".into())) })
    }
}

// ── Full pipeline, rule-based ────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_rule_based() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "paper.pdf");

    let output = process(&input, &ProcessConfig::default()).await.unwrap();

    assert_eq!(output.document.title, "A Study of Paper Cleaning");
    assert!(output
        .document
        .abstract_text
        .contains("This is the abstract"));
    assert!(!output.document.abstract_text.contains("Abstract"));

    let headings: Vec<&str> = output
        .document
        .sections
        .iter()
        .map(|s| s.heading.as_str())
        .collect();
    assert_eq!(headings, vec!["Introduction", "Methods"]);

    // Front matter gone, URL gone, equation replaced.
    let intro = &output.document.sections[0].content;
    assert!(!intro.contains("https://"));
    assert!(intro.contains("Visit for details"));
    let methods = &output.document.sections[1].content;
    assert!(methods.contains("[Equation: E = mc^2]"));
    assert!(!methods.contains('$'));
    for section in &output.document.sections {
        assert!(!section.content.contains("jane.roe@univ-x.edu"));
    }

    // The rendered output is a parseable PDF.
    assert!(output.pdf.starts_with(b"%PDF"));
    let rendered = Document::load_mem(&output.pdf).unwrap();
    assert!(!rendered.get_pages().is_empty());

    assert_eq!(output.stats.sections, 2);
    assert_eq!(output.stats.equations, 1);
    assert_eq!(output.stats.llm_calls, 0);
}

#[tokio::test]
async fn rendered_output_contains_title_literal() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "paper.pdf");

    let output = process(&input, &ProcessConfig::default()).await.unwrap();
    let needle = b"(A Study of Paper Cleaning)";
    assert!(
        output.pdf.windows(needle.len()).any(|w| w == needle),
        "title literal missing from rendered PDF"
    );
}

// ── Fallback property ────────────────────────────────────────────────────

#[tokio::test]
async fn failing_llm_mode_output_is_byte_identical_to_rule_based() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "paper.pdf");

    let rule_config = ProcessConfig::default();
    let llm_config = ProcessConfig::builder()
        .remote(Arc::new(FailingTransport))
        .build()
        .unwrap();
    assert_eq!(llm_config.mode, Mode::LlmAssisted);

    let rule = process(&input, &rule_config).await.unwrap();
    let llm = process(&input, &llm_config).await.unwrap();

    assert_eq!(rule.document, llm.document);
    assert_eq!(rule.pdf, llm.pdf, "rendered bytes must match exactly");

    // Every call was attempted and every call fell back.
    assert!(llm.stats.llm_calls > 0);
    assert_eq!(llm.stats.llm_calls, llm.stats.llm_fallbacks);
    assert_eq!(rule.stats.llm_calls, 0);
}

// ── Inspect mode ─────────────────────────────────────────────────────────

#[tokio::test]
async fn inspect_skips_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "paper.pdf");

    let output = inspect(&input, &ProcessConfig::default()).await.unwrap();
    assert!(output.pdf.is_empty());
    assert_eq!(output.document.title, "A Study of Paper Cleaning");

    // The record serialises for --json consumers.
    let json = serde_json::to_string(&output).unwrap();
    assert!(json.contains("Introduction"));
}

// ── Terminal errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_input_is_terminal_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.pdf");
    let err = process_to_file("/no/such/paper.pdf", &out, &ProcessConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::FileNotFound { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn non_pdf_input_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.pdf");
    std::fs::write(&input, "just a text file").unwrap();

    let err = process(&input, &ProcessConfig::default()).await.unwrap_err();
    assert!(matches!(err, ProcessError::NotAPdf { .. }));
}

// ── Batch mode ───────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_processes_documents_independently() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_fixture(dir.path(), "a.pdf");
    let b = write_fixture(dir.path(), "b.pdf");
    let broken = dir.path().join("broken.pdf");
    std::fs::write(&broken, "%PDF-oops this is not really a pdf").unwrap();

    let out_dir = dir.path().join("out");
    let results = process_batch(
        vec![a, b, broken.clone()],
        &out_dir,
        &ProcessConfig::default(),
        2,
    )
    .await;

    assert_eq!(results.len(), 3);
    let ok = results.iter().filter(|r| r.result.is_ok()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.result.is_err()).collect();
    assert_eq!(ok, 2, "the two valid papers must both succeed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].input, broken);

    assert!(out_dir.join("a.tidy.pdf").exists());
    assert!(out_dir.join("b.tidy.pdf").exists());
    assert!(!out_dir.join("broken.tidy.pdf").exists());
}

// ── Text-level scenarios ─────────────────────────────────────────────────

const SCENARIO: &str = "Paper Title\n\nJohn Doe, Jane Roe\nUniversity X\n\nAbstract\nThis is the abstract.\n\n1. Introduction\nSome intro text.\n\n2. Methods\nSome methods text.";

#[test]
fn scenario_title_abstract_sections() {
    let patterns = PatternLibrary::default();

    assert_eq!(heuristics::extract_title(SCENARIO, &patterns), "Paper Title");
    assert_eq!(
        heuristics::extract_abstract(SCENARIO, &patterns),
        "This is the abstract."
    );

    let body = heuristics::remove_before_abstract(SCENARIO, &patterns);
    let sections = heuristics::parse_sections(body, &patterns);
    assert_eq!(
        sections,
        vec![
            Section::new("Introduction", "Some intro text."),
            Section::new("Methods", "Some methods text."),
        ]
    );
}

#[test]
fn normalization_is_idempotent_once_clean() {
    let patterns = PatternLibrary::default();
    let dirty = "See https://example.com and doi:10.1/x  plus   spaces.\n\n\n\nNext.";
    let clean = normalize::normalize(dirty, &[], &[], &patterns);
    let again = normalize::normalize(&clean, &[], &[], &patterns);
    assert_eq!(clean, again);
    assert!(!clean.contains("https://"));
    assert!(!clean.contains("10.1/x"));
}

#[test]
fn equation_and_table_substitution_compose() {
    let patterns = PatternLibrary::default();
    let text = "As Table 1 shows, $a+b$ holds.";
    let spans = heuristics::find_equation_spans(text, &patterns);
    let equations: Vec<_> = spans
        .into_iter()
        .map(|s| {
            let d = heuristics::describe_equation(&text[s.clone()]);
            (s, d)
        })
        .collect();
    let out = normalize::normalize(
        text,
        &equations,
        &["Table with 3 rows and 2 columns.".into()],
        &patterns,
    );
    assert!(out.contains("[Equation: a+b]"));
    assert!(out.contains("[Table 1: Table with 3 rows and 2 columns.]"));
}
