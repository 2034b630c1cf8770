//! # md2pdf
//!
//! Batch-convert Markdown files to styled PDFs.
//!
//! md2pdf does no parsing or typesetting of its own. Each file goes through
//! [pandoc](https://pandoc.org) to become typst markup, gets a fixed styling
//! preamble, and is compiled by [typst](https://typst.app). This crate owns the
//! orchestration around those two tools: finding the files, sequencing the
//! steps, cleaning up, and counting what worked.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input (file or directory)
//!  │
//!  ├─ 1. Discover  .md files, optionally recursive
//!  ├─ 2. Check     pandoc and typst are installed
//!  ├─ 3. Per file, sequentially:
//!  │      markup   pandoc  → <out>/<stem>.typ
//!  │      style    prepend the preamble
//!  │      compile  typst   → <out>/<stem>.pdf
//!  └─ 4. Summary   successes / failures
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{convert_batch, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .output_dir("pdf_output")
//!         .recursive(true)
//!         .build()?;
//!     let summary = convert_batch("docs/", &config).await?;
//!     eprintln!("{} converted, {} failed", summary.success_count, summary.failure_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Installing typst
//!
//! The companion crate [`typst_auto`] downloads a pinned typst release and adds
//! it to the user's command search path (`md2pdf --install`). pandoc must be
//! installed separately.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod discover;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod template;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ToolCommand, DEFAULT_OUTPUT_DIR};
pub use convert::{convert_batch, convert_batch_sync, plan_batch, plan_jobs, run_jobs};
pub use discover::{discover_markdown, is_markdown};
pub use error::{JobError, Md2PdfError, MissingTool};
pub use output::{BatchSummary, ConversionJob, ConversionResult, JobOutcome};
pub use pipeline::run_job;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use template::{FontPair, StyleTemplate};
pub use tools::resolve_tools;
