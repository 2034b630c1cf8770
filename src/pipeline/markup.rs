//! Step 1: markdown → typst markup via pandoc.

use crate::config::ConversionConfig;
use crate::error::JobError;
use crate::output::ConversionJob;
use crate::tools::run_tool;
use std::ffi::OsStr;
use std::path::Path;

/// Builds the converter's argument list (after any leading arguments).
pub(crate) fn converter_args<'a>(source: &'a Path, intermediate: &'a Path) -> [&'a OsStr; 7] {
    [
        source.as_os_str(),
        OsStr::new("--from"),
        OsStr::new("markdown"),
        OsStr::new("--to"),
        OsStr::new("typst"),
        OsStr::new("--output"),
        intermediate.as_os_str(),
    ]
}

/// Converts `job.source()` into `intermediate`.
///
/// The tool may or may not have left a partial file behind on failure; the
/// caller cleans up.
pub async fn to_typst(
    job: &ConversionJob,
    intermediate: &Path,
    config: &ConversionConfig,
) -> Result<(), JobError> {
    run_tool(
        &config.converter,
        converter_args(job.source(), intermediate),
        config.tool_timeout(),
    )
    .await
    .map_err(|detail| JobError::MarkupConversionFailed {
        path: job.source().to_path_buf(),
        detail,
    })
}
