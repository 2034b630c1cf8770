//! Error types for the md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`]: **Fatal**: the batch cannot start at all (input path
//!   missing, input is not markdown, a required tool is not installed).
//!   Returned as `Err(Md2PdfError)` from the top-level `convert_*` functions.
//!
//! * [`JobError`]: **Non-fatal**: a single file failed at one pipeline step
//!   but every other file is still attempted. Stored inside
//!   [`crate::output::JobOutcome::Failure`] and counted in the batch summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path does not exist.
    #[error("Input path not found: '{path}'\nCheck the path exists and is readable.")]
    PathNotFound { path: PathBuf },

    /// Input is a file, but not a markdown file.
    #[error("Not a markdown file: '{path}'\nExpected a .md file or a directory.")]
    InvalidInputKind { path: PathBuf },

    // ── Environment errors ────────────────────────────────────────────────
    /// One or more external tools are not on the command search path.
    #[error("{}", format_missing(.0))]
    MissingTools(Vec<MissingTool>),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A custom styling template could not be read.
    #[error("Failed to read template '{path}': {source}")]
    TemplateReadFailed {
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

/// An external tool that could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    /// Program name or path as configured, e.g. `pandoc`.
    pub tool: String,
    /// How to obtain it.
    pub hint: String,
}

impl fmt::Display for MissingTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not installed or not on PATH. {}", self.tool, self.hint)
    }
}

fn format_missing(tools: &[MissingTool]) -> String {
    let lines: Vec<String> = tools.iter().map(|t| format!("  • {t}")).collect();
    format!("Missing required tools:\n{}", lines.join("\n"))
}

/// A non-fatal error for a single conversion job.
///
/// The variant names the pipeline step that failed; `detail` carries the
/// tool's exit status and the tail of its stderr, or the I/O error.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobError {
    /// The markdown converter failed; nothing else ran.
    #[error("{path}: markdown conversion failed: {detail}")]
    MarkupConversionFailed { path: PathBuf, detail: String },

    /// Reading or rewriting the intermediate file failed.
    #[error("{path}: styling injection failed: {detail}")]
    StylingInjectionFailed { path: PathBuf, detail: String },

    /// The typesetting compiler failed; the styled intermediate is kept.
    #[error("{path}: PDF compilation failed: {detail}")]
    CompilationFailed { path: PathBuf, detail: String },
}

impl JobError {
    /// The source file the job was converting.
    pub fn path(&self) -> &PathBuf {
        match self {
            JobError::MarkupConversionFailed { path, .. }
            | JobError::StylingInjectionFailed { path, .. }
            | JobError::CompilationFailed { path, .. } => path,
        }
    }
}
