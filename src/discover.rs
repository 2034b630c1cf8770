//! Locate markdown files under the user-supplied input path.

use crate::error::Md2PdfError;
use crate::output::MARKDOWN_EXTENSION;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Returns `true` if `path` carries the markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
}

/// Collects the markdown files to convert.
///
/// * A file input yields itself, or [`Md2PdfError::InvalidInputKind`] when it
///   is not markdown.
/// * A directory input yields the markdown files directly inside it, or at any
///   depth when `recursive` is set. Symlinks are not followed.
/// * A missing input is [`Md2PdfError::PathNotFound`].
///
/// An empty result is not an error. The list is sorted, but callers should
/// only rely on its contents.
pub fn discover_markdown(input: &Path, recursive: bool) -> Result<Vec<PathBuf>, Md2PdfError> {
    if !input.exists() {
        return Err(Md2PdfError::PathNotFound {
            path: input.to_path_buf(),
        });
    }

    if !input.is_dir() {
        if is_markdown(input) {
            return Ok(vec![input.to_path_buf()]);
        }
        return Err(Md2PdfError::InvalidInputKind {
            path: input.to_path_buf(),
        });
    }

    let mut walker = WalkDir::new(input).min_depth(1).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", input.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!(
        "Discovered {} markdown file(s) under {} (recursive={})",
        files.len(),
        input.display(),
        recursive
    );
    Ok(files)
}
