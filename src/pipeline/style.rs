//! Step 2: prepend the styling preamble to the intermediate file.

use crate::error::JobError;
use crate::output::ConversionJob;
use crate::template::StyleTemplate;
use std::path::Path;
use tracing::debug;

/// Rewrites `intermediate` as `preamble + original contents`.
pub async fn inject(
    job: &ConversionJob,
    intermediate: &Path,
    template: &StyleTemplate,
) -> Result<(), JobError> {
    let fail = |what: &str, e: std::io::Error| JobError::StylingInjectionFailed {
        path: job.source().to_path_buf(),
        detail: format!("{what} {}: {e}", intermediate.display()),
    };

    let body = tokio::fs::read_to_string(intermediate)
        .await
        .map_err(|e| fail("cannot read", e))?;
    tokio::fs::write(intermediate, template.apply(&body))
        .await
        .map_err(|e| fail("cannot write", e))?;

    debug!("Styled {} ({} bytes of body)", intermediate.display(), body.len());
    Ok(())
}
