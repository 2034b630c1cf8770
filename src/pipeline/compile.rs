//! Step 3: typst markup → PDF via `typst compile`.

use crate::config::ConversionConfig;
use crate::error::JobError;
use crate::output::ConversionJob;
use crate::tools::run_tool;
use std::ffi::OsStr;
use std::path::Path;

/// Compiles `intermediate` into `job.destination()`.
///
/// A zero exit status without a PDF on disk also counts as a failure.
pub async fn to_pdf(
    job: &ConversionJob,
    intermediate: &Path,
    config: &ConversionConfig,
) -> Result<(), JobError> {
    let fail = |detail: String| JobError::CompilationFailed {
        path: job.source().to_path_buf(),
        detail,
    };

    run_tool(
        &config.compiler,
        [
            OsStr::new("compile"),
            intermediate.as_os_str(),
            job.destination().as_os_str(),
        ],
        config.tool_timeout(),
    )
    .await
    .map_err(fail)?;

    if !job.destination().is_file() {
        return Err(fail(format!(
            "{} reported success but wrote no {}",
            config.compiler.display_name(),
            job.destination().display()
        )));
    }
    Ok(())
}
