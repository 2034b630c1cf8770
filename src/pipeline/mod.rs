//! Pipeline stages for Markdown-to-PDF conversion of a single file.
//!
//! Each submodule implements exactly one step; [`run_job`] sequences them and
//! owns the cleanup policy.
//!
//! ## Data Flow
//!
//! ```text
//! source.md ──▶ markup ──▶ style ──▶ compile ──▶ dest.pdf
//!              (pandoc)  (preamble)  (typst)
//!                   └── dest.typ ───────┘
//! ```
//!
//! 1. [`markup`]: pandoc writes `<output>/<stem>.typ`
//! 2. [`style`]: the styling preamble is prepended to that file in place
//! 3. [`compile`]: typst turns it into `<output>/<stem>.pdf`
//!
//! ## Cleanup policy
//!
//! | Step that failed | `.typ` afterwards | `.pdf` afterwards |
//! |------------------|-------------------|-------------------|
//! | none             | removed           | present           |
//! | markup / style   | removed           | untouched         |
//! | compile          | **kept**          | removed           |
//!
//! Keeping the styled `.typ` after a compile failure lets the user rerun
//! `typst compile` on it by hand. Removal is best-effort: a failed delete is
//! logged and never changes the outcome.

pub mod compile;
pub mod markup;
pub mod style;

use crate::config::ConversionConfig;
use crate::error::JobError;
use crate::output::{ConversionJob, ConversionResult, JobOutcome};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs one job through all three steps.
///
/// Never returns an error: every failure becomes [`JobOutcome::Failure`].
pub async fn run_job(job: &ConversionJob, config: &ConversionConfig) -> ConversionResult {
    let start = Instant::now();
    let outcome = match run_steps(job, config).await {
        Ok(()) => {
            info!("{} → {}", job.source().display(), job.destination().display());
            JobOutcome::Success
        }
        Err(e) => {
            // Reported through the result and the summary; not a warning.
            info!("{e}");
            JobOutcome::Failure(e)
        }
    };
    ConversionResult {
        job: job.clone(),
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn run_steps(job: &ConversionJob, config: &ConversionConfig) -> Result<(), JobError> {
    let intermediate = job.intermediate();

    if let Err(e) = markup::to_typst(job, &intermediate, config).await {
        remove_best_effort(&intermediate).await;
        return Err(e);
    }

    if let Err(e) = style::inject(job, &intermediate, &config.template).await {
        remove_best_effort(&intermediate).await;
        return Err(e);
    }

    if let Err(e) = compile::to_pdf(job, &intermediate, config).await {
        remove_best_effort(job.destination()).await;
        info!("Kept {} for inspection", intermediate.display());
        return Err(e);
    }

    remove_best_effort(&intermediate).await;
    Ok(())
}

async fn remove_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
