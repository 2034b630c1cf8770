//! Jobs, per-job results and the batch summary.

use crate::error::JobError;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Extension of files picked up by discovery (compared case-insensitively).
pub const MARKDOWN_EXTENSION: &str = "md";
/// Extension of the intermediate typst document.
pub const INTERMEDIATE_EXTENSION: &str = "typ";
/// Extension of the produced document.
pub const PDF_EXTENSION: &str = "pdf";

/// One markdown file and the PDF it becomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    source: PathBuf,
    destination: PathBuf,
}

impl ConversionJob {
    /// Destination is `output_dir/<stem of source>.pdf`.
    pub fn new(source: impl Into<PathBuf>, output_dir: &Path) -> Self {
        let source = source.into();
        let stem = source_stem(&source);
        Self::with_stem(source, output_dir, &stem)
    }

    /// Destination is `output_dir/<stem>.pdf`, whatever the source is called.
    ///
    /// Used when two sources in one batch share a file stem.
    pub fn with_stem(source: impl Into<PathBuf>, output_dir: &Path, stem: &OsStr) -> Self {
        // Built by hand: `with_extension` would eat the tail of "v1.2-notes".
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(PDF_EXTENSION);
        Self {
            source: source.into(),
            destination: output_dir.join(file_name),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The typst file written next to the destination during conversion.
    pub fn intermediate(&self) -> PathBuf {
        self.destination.with_extension(INTERMEDIATE_EXTENSION)
    }
}

/// File stem of a source, or `document` for a path without one.
pub(crate) fn source_stem(source: &Path) -> OsString {
    source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "document".into())
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Success,
    Failure(JobError),
}

/// The result of running one job through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job: ConversionJob,
    pub outcome: JobOutcome,
    pub duration_ms: u64,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success)
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            JobOutcome::Success => None,
            JobOutcome::Failure(e) => Some(e),
        }
    }
}

/// Counts accumulated over a batch, printed once at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub output_directory: PathBuf,
    /// Every failure, in the order jobs ran.
    pub failures: Vec<JobError>,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &ConversionResult) {
        match &result.outcome {
            JobOutcome::Success => self.success_count += 1,
            JobOutcome::Failure(e) => {
                self.failure_count += 1;
                self.failures.push(e.clone());
            }
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_replaces_dir_and_extension() {
        let job = ConversionJob::new("notes/2024/todo.md", Path::new("pdf_output"));
        assert_eq!(job.destination(), Path::new("pdf_output/todo.pdf"));
        assert_eq!(job.intermediate(), PathBuf::from("pdf_output/todo.typ"));
        assert_eq!(job.source(), Path::new("notes/2024/todo.md"));
    }

    #[test]
    fn destination_keeps_inner_dots() {
        let job = ConversionJob::new("v1.2-release.md", Path::new("out"));
        assert_eq!(job.destination(), Path::new("out/v1.2-release.pdf"));
    }

    #[test]
    fn explicit_stem_overrides_source_name() {
        let job = ConversionJob::with_stem("b/x.md", Path::new("out"), OsStr::new("x-1"));
        assert_eq!(job.destination(), Path::new("out/x-1.pdf"));
        assert_eq!(job.intermediate(), PathBuf::from("out/x-1.typ"));
        assert_eq!(job.source(), Path::new("b/x.md"));
    }

    #[test]
    fn destination_lies_under_output_dir() {
        let out = Path::new("/tmp/out");
        for src in ["a.md", "../b.md", "/abs/path/c.MD"] {
            let job = ConversionJob::new(src, out);
            assert!(job.destination().starts_with(out), "{src}");
        }
    }

    #[test]
    fn summary_counts_match_results() {
        let mut summary = BatchSummary::new("out");
        let ok = ConversionResult {
            job: ConversionJob::new("a.md", Path::new("out")),
            outcome: JobOutcome::Success,
            duration_ms: 3,
        };
        let failed = ConversionResult {
            job: ConversionJob::new("b.md", Path::new("out")),
            outcome: JobOutcome::Failure(JobError::CompilationFailed {
                path: "b.md".into(),
                detail: "exit status: 1".into(),
            }),
            duration_ms: 4,
        };
        summary.record(&ok);
        summary.record(&failed);
        summary.record(&ok);

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failures.len(), 1);
        assert!(failed.error().is_some());
        assert!(ok.is_success());
    }
}
