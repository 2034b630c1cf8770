//! Batch conversion entry points.
//!
//! [`convert_batch`] is the primary API: discover, check tools, create the
//! output directory, then run every job in turn. Jobs run strictly one after
//! another and a failing job never stops the ones after it; the returned
//! [`BatchSummary`] counts exactly the outcomes observed.

use crate::config::ConversionConfig;
use crate::discover::discover_markdown;
use crate::error::Md2PdfError;
use crate::output::{source_stem, BatchSummary, ConversionJob, JobOutcome};
use crate::pipeline;
use crate::tools::resolve_tools;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Convert a markdown file, or every markdown file in a directory, to PDF.
///
/// # Returns
/// `Ok(BatchSummary)` once every job was attempted, even if some failed
/// (check `summary.failure_count`). An input without markdown files yields an
/// empty summary.
///
/// # Errors
/// Returns `Err(Md2PdfError)` only before any job runs:
/// - input path missing, or a single file that is not markdown
/// - `pandoc` or `typst` not installed
/// - output directory cannot be created
pub async fn convert_batch(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchSummary, Md2PdfError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!(
        "Starting batch: {} → {}",
        input.display(),
        config.output_dir.display()
    );

    // ── Step 1: Discover files ───────────────────────────────────────────
    let jobs = plan_batch(input, config)?;

    // ── Step 2: Check external tools ─────────────────────────────────────
    let config = resolve_tools(config)?;

    // ── Step 3: Ensure output directory ──────────────────────────────────
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| Md2PdfError::OutputDirFailed {
            path: config.output_dir.clone(),
            source,
        })?;

    // ── Step 4: Run jobs ─────────────────────────────────────────────────
    let mut summary = run_jobs(&jobs, &config).await;
    summary.duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {} succeeded, {} failed, {}ms total",
        summary.success_count, summary.failure_count, summary.duration_ms
    );
    Ok(summary)
}

/// Synchronous wrapper around [`convert_batch`] for non-async callers.
pub fn convert_batch_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchSummary, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_batch(input, config))
}

/// Discovers the input's markdown files and builds their jobs, without
/// touching the filesystem otherwise.
pub fn plan_batch(input: &Path, config: &ConversionConfig) -> Result<Vec<ConversionJob>, Md2PdfError> {
    let sources = discover_markdown(input, config.recursive)?;
    Ok(plan_jobs(sources, &config.output_dir))
}

/// Builds one job per source, every one with its own destination.
///
/// Recursive discovery flattens sources into one directory, so `a/x.md` and
/// `b/x.md` would both become `x.pdf`. The first source keeps the plain name
/// and later ones get `x-1.pdf`, `x-2.pdf` and so on, skipping any name
/// another source would produce on its own. Names are compared
/// case-insensitively so the result holds on case-folding filesystems.
pub fn plan_jobs(sources: Vec<PathBuf>, output_dir: &Path) -> Vec<ConversionJob> {
    let key = |stem: &OsStr| stem.to_string_lossy().to_lowercase();

    let stems: Vec<OsString> = sources.iter().map(|s| source_stem(s)).collect();
    let mut taken: HashSet<String> = stems.iter().map(|s| key(s)).collect();
    let mut first_claim: HashSet<String> = HashSet::new();

    sources
        .into_iter()
        .zip(stems)
        .map(|(source, stem)| {
            if first_claim.insert(key(&stem)) {
                return ConversionJob::new(source, output_dir);
            }
            let renamed = (1..)
                .map(|n| {
                    let mut candidate = stem.clone();
                    candidate.push(format!("-{n}"));
                    candidate
                })
                .find(|candidate| taken.insert(key(candidate)))
                .unwrap_or_else(|| stem.clone());
            let job = ConversionJob::with_stem(source, output_dir, &renamed);
            warn!(
                "{} shares its name with an earlier file; writing it to {}",
                job.source().display(),
                job.destination().display()
            );
            job
        })
        .collect()
}

/// Runs `jobs` sequentially, reporting progress and accumulating counts.
///
/// The tools in `config` are used as given; see [`crate::resolve_tools`].
pub async fn run_jobs(jobs: &[ConversionJob], config: &ConversionConfig) -> BatchSummary {
    let total = jobs.len();
    let mut summary = BatchSummary::new(&config.output_dir);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    for (i, job) in jobs.iter().enumerate() {
        let index = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_job_start(index, total, job.source());
        }

        let result = pipeline::run_job(job, config).await;

        if let Some(ref cb) = config.progress_callback {
            match &result.outcome {
                JobOutcome::Success => cb.on_job_complete(index, total, job.destination()),
                JobOutcome::Failure(e) => cb.on_job_error(index, total, job.source(), &e.to_string()),
            }
        }
        summary.record(&result);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, summary.success_count);
    }
    summary
}
