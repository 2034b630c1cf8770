//! Batch integration tests for md2pdf.
//!
//! The real pandoc and typst are replaced by small shell scripts so the whole
//! pipeline runs offline and in milliseconds:
//!
//! * fake pandoc copies the markdown verbatim into the `--output` file and
//!   fails on any source containing `FAIL_MARKUP`
//! * fake typst writes a one-line PDF and fails on any input containing
//!   `FAIL_COMPILE`
//!
//! Scripts are run as `sh <script>` so they need no exec bit.
//!
//! Run with:
//!   cargo test --test batch -- --nocapture

#![cfg(unix)]

use md2pdf::{
    convert_batch, BatchProgressCallback, ConversionConfig, JobError, Md2PdfError,
    StyleTemplate, ToolCommand,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Routes library logs to the test harness; visible with `--nocapture`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("md2pdf=debug")),
        )
        .with_test_writer()
        .try_init();
}

const FAKE_PANDOC: &str = r#"
src="$1"
out="$7"
if grep -q FAIL_MARKUP "$src"; then
  echo "pandoc: could not parse $src" >&2
  exit 3
fi
cp "$src" "$out"
"#;

const FAKE_TYPST: &str = r#"
if grep -q FAIL_COMPILE "$2"; then
  echo "error: unknown variable: FAIL_COMPILE" >&2
  exit 1
fi
echo '%PDF-1.7' > "$3"
"#;

/// A scratch directory with fake tools in `bin/`, inputs in `docs/`, and
/// output going to `out/`.
struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        init_logging();
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("bin")).unwrap();
        fs::create_dir_all(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("bin/pandoc.sh"), FAKE_PANDOC).unwrap();
        fs::write(tmp.path().join("bin/typst.sh"), FAKE_TYPST).unwrap();
        Self { tmp }
    }

    fn docs(&self) -> PathBuf {
        self.tmp.path().join("docs")
    }

    fn out(&self) -> PathBuf {
        self.tmp.path().join("out")
    }

    fn write_doc(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.docs().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn config(&self) -> md2pdf::ConversionConfigBuilder {
        ConversionConfig::builder()
            .output_dir(self.out())
            .converter(ToolCommand::new("sh").arg(self.tmp.path().join("bin/pandoc.sh")))
            .compiler(ToolCommand::new("sh").arg(self.tmp.path().join("bin/typst.sh")))
            .tool_timeout_secs(30)
    }

    /// Sorted file names currently in the output directory.
    fn out_listing(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.out())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    batch_total: AtomicUsize,
}

impl BatchProgressCallback for Counting {
    fn on_batch_start(&self, total_files: usize) {
        self.batch_total.store(total_files, Ordering::SeqCst);
    }
    fn on_job_start(&self, _index: usize, _total: usize, _source: &Path) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_job_complete(&self, _index: usize, _total: usize, _destination: &Path) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_job_error(&self, _index: usize, _total: usize, _source: &Path, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_file_produces_pdf_and_no_leftovers() {
    let fx = Fixture::new();
    let notes = fx.write_doc("notes.md", "# Notes\n\nHello.\n");
    let config = fx.config().build().unwrap();

    let summary = convert_batch(&notes, &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (1, 0));
    assert_eq!(summary.output_directory, fx.out());
    assert_eq!(fx.out_listing(), ["notes.pdf"]);
    let pdf = fs::read_to_string(fx.out().join("notes.pdf")).unwrap();
    assert!(pdf.starts_with("%PDF"));
}

#[tokio::test]
async fn default_output_dir_is_relative_to_working_directory() {
    let fx = Fixture::new();
    let notes = fx.write_doc("notes.md", "# Notes");
    // Every other test uses absolute paths, so moving the process cwd is safe.
    let original_cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(fx.tmp.path()).unwrap();
    let config = ConversionConfig::builder()
        .converter(ToolCommand::new("sh").arg(fx.tmp.path().join("bin/pandoc.sh")))
        .compiler(ToolCommand::new("sh").arg(fx.tmp.path().join("bin/typst.sh")))
        .build()
        .unwrap();

    let summary = convert_batch(&notes, &config).await;
    std::env::set_current_dir(original_cwd).unwrap();
    let summary = summary.unwrap();

    assert_eq!(summary.output_directory, PathBuf::from("pdf_output"));
    assert!(fx.tmp.path().join("pdf_output/notes.pdf").is_file());
}

#[tokio::test]
async fn missing_input_is_fatal_and_creates_nothing() {
    let fx = Fixture::new();
    let config = fx.config().build().unwrap();

    let err = convert_batch(fx.docs().join("missing.md"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Md2PdfError::PathNotFound { .. }), "got {err:?}");
    assert!(!fx.out().exists());
}

#[tokio::test]
async fn non_markdown_file_is_rejected() {
    let fx = Fixture::new();
    let txt = fx.write_doc("readme.txt", "plain");
    let config = fx.config().build().unwrap();

    let err = convert_batch(&txt, &config).await.unwrap_err();
    assert!(matches!(err, Md2PdfError::InvalidInputKind { .. }), "got {err:?}");
}

#[tokio::test]
async fn missing_tools_are_all_reported_before_any_work() {
    let fx = Fixture::new();
    fx.write_doc("a.md", "# a");
    let config = fx
        .config()
        .converter(ToolCommand::new("md2pdf-test-no-such-converter"))
        .compiler(ToolCommand::new("md2pdf-test-no-such-compiler"))
        .build()
        .unwrap();

    let err = convert_batch(fx.docs(), &config).await.unwrap_err();
    match err {
        Md2PdfError::MissingTools(tools) => assert_eq!(tools.len(), 2),
        other => panic!("expected MissingTools, got {other:?}"),
    }
    assert!(!fx.out().exists());
}

#[tokio::test]
async fn non_recursive_run_skips_subdirectories() {
    let fx = Fixture::new();
    fx.write_doc("a.md", "# a");
    fx.write_doc("b.md", "# b");
    fx.write_doc("sub/c.md", "# c");
    let config = fx.config().build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (2, 0));
    assert_eq!(fx.out_listing(), ["a.pdf", "b.pdf"]);
}

#[tokio::test]
async fn recursive_run_flattens_into_output_dir() {
    let fx = Fixture::new();
    fx.write_doc("a.md", "# a");
    fx.write_doc("sub/c.md", "# c");
    fx.write_doc("sub/deeper/d.MD", "# d");
    let config = fx.config().recursive(true).build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (3, 0));
    assert_eq!(fx.out_listing(), ["a.pdf", "c.pdf", "d.pdf"]);
}

#[tokio::test]
async fn same_name_failure_does_not_remove_earlier_pdf() {
    let fx = Fixture::new();
    fx.write_doc("a/x.md", "# ok");
    fx.write_doc("b/x.md", "FAIL_COMPILE");
    let config = fx.config().recursive(true).build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (1, 1));
    assert_eq!(fx.out_listing(), ["x-1.typ", "x.pdf"]);
}

#[tokio::test]
async fn same_name_success_does_not_remove_earlier_intermediate() {
    let fx = Fixture::new();
    fx.write_doc("a/x.md", "FAIL_COMPILE");
    fx.write_doc("b/x.md", "# ok");
    let config = fx.config().recursive(true).build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (1, 1));
    assert_eq!(fx.out_listing(), ["x-1.pdf", "x.typ"]);
    let kept = fs::read_to_string(fx.out().join("x.typ")).unwrap();
    assert!(kept.contains("FAIL_COMPILE"));
}

#[tokio::test]
async fn empty_directory_is_zero_zero() {
    let fx = Fixture::new();
    fx.write_doc("notes.txt", "not markdown");
    let config = fx.config().build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (0, 0));
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn compile_failure_keeps_styled_intermediate_only_for_that_file() {
    let fx = Fixture::new();
    fx.write_doc("a.md", "# a");
    fx.write_doc("b.md", "# b\n\nFAIL_COMPILE\n");
    fx.write_doc("c.md", "# c");
    let config = fx.config().build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (2, 1));
    assert_eq!(fx.out_listing(), ["a.pdf", "b.typ", "c.pdf"]);
    match &summary.failures[0] {
        JobError::CompilationFailed { path, detail } => {
            assert!(path.ends_with("b.md"));
            assert!(detail.contains("unknown variable"), "detail: {detail}");
        }
        other => panic!("expected CompilationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn markup_failure_leaves_no_intermediate() {
    let fx = Fixture::new();
    fx.write_doc("bad.md", "FAIL_MARKUP");
    fx.write_doc("good.md", "# good");
    let config = fx.config().build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (1, 1));
    assert_eq!(fx.out_listing(), ["good.pdf"]);
    assert!(matches!(
        summary.failures[0],
        JobError::MarkupConversionFailed { .. }
    ));
}

#[tokio::test]
async fn retained_intermediate_starts_with_preamble() {
    let fx = Fixture::new();
    fx.write_doc("x.md", "= Body\nFAIL_COMPILE\n");
    let preamble = "#set page(margin: 2.5cm)\n#set text(font: \"Test Sans\")\n";
    let config = fx
        .config()
        .template(StyleTemplate::from_source(preamble))
        .build()
        .unwrap();

    convert_batch(fx.docs(), &config).await.unwrap();

    let typ = fs::read_to_string(fx.out().join("x.typ")).unwrap();
    assert!(typ.starts_with(preamble), "typ: {typ}");
    assert!(typ.ends_with("= Body\nFAIL_COMPILE\n"));
}

#[tokio::test]
async fn counts_and_callbacks_agree_with_discovery() {
    let fx = Fixture::new();
    fx.write_doc("1.md", "# one");
    fx.write_doc("2.md", "FAIL_MARKUP");
    fx.write_doc("3.md", "FAIL_COMPILE");
    fx.write_doc("4.md", "# four");
    let counting = Arc::new(Counting::default());
    let config = fx
        .config()
        .progress_callback(counting.clone())
        .build()
        .unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!(summary.total(), 4);
    assert_eq!((summary.success_count, summary.failure_count), (2, 2));
    assert_eq!(counting.batch_total.load(Ordering::SeqCst), 4);
    assert_eq!(counting.started.load(Ordering::SeqCst), 4);
    assert_eq!(counting.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counting.failed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn existing_output_is_overwritten() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.out()).unwrap();
    fs::write(fx.out().join("n.pdf"), "stale").unwrap();
    fx.write_doc("n.md", "# n");
    let config = fx.config().build().unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!(summary.success_count, 1);
    let pdf = fs::read_to_string(fx.out().join("n.pdf")).unwrap();
    assert!(pdf.starts_with("%PDF"));
}

#[tokio::test]
async fn slow_tool_times_out_as_job_failure() {
    let fx = Fixture::new();
    fx.write_doc("slow.md", "# slow");
    fs::write(fx.tmp.path().join("bin/slow.sh"), "sleep 10\n").unwrap();
    let config = fx
        .config()
        .compiler(ToolCommand::new("sh").arg(fx.tmp.path().join("bin/slow.sh")))
        .tool_timeout_secs(1)
        .build()
        .unwrap();

    let summary = convert_batch(fx.docs(), &config).await.unwrap();

    assert_eq!((summary.success_count, summary.failure_count), (0, 1));
    assert!(summary.failures[0].to_string().contains("timed out"));
}
