//! The typst styling preamble injected in front of every converted document.
//!
//! pandoc's typst writer emits body markup only, so page setup, fonts, heading
//! rules, code and quote treatment, and the `horizontalrule` helper that pandoc
//! references for `---` all come from here. The builtin preamble lives in
//! `templates/style.typ`; a replacement can be loaded from disk with
//! [`StyleTemplate::from_file`].
//!
//! Templates may use two placeholders, filled with the platform's font pair:
//! `{{sans_font}}` and `{{mono_font}}`.

use crate::error::Md2PdfError;
use std::path::Path;

const BUILTIN: &str = include_str!("../templates/style.typ");

const SANS_PLACEHOLDER: &str = "{{sans_font}}";
const MONO_PLACEHOLDER: &str = "{{mono_font}}";

/// Body and code font families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPair {
    pub sans: String,
    pub mono: String,
}

impl FontPair {
    pub fn new(sans: impl Into<String>, mono: impl Into<String>) -> Self {
        Self {
            sans: sans.into(),
            mono: mono.into(),
        }
    }

    /// Fonts that ship with the given OS (spelled like `std::env::consts::OS`).
    pub fn for_os(os: &str) -> Self {
        match os {
            "macos" => Self::new("Helvetica Neue", "Menlo"),
            "windows" => Self::new("Segoe UI", "Consolas"),
            _ => Self::new("DejaVu Sans", "DejaVu Sans Mono"),
        }
    }

    pub fn for_current_platform() -> Self {
        Self::for_os(std::env::consts::OS)
    }
}

/// A rendered styling preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleTemplate {
    preamble: String,
}

impl Default for StyleTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StyleTemplate {
    /// The builtin preamble with this platform's fonts.
    pub fn builtin() -> Self {
        Self::render(BUILTIN, &FontPair::for_current_platform())
    }

    /// The builtin preamble with an explicit font pair.
    pub fn with_fonts(fonts: &FontPair) -> Self {
        Self::render(BUILTIN, fonts)
    }

    /// A custom template; placeholders get this platform's fonts.
    pub fn from_source(source: &str) -> Self {
        Self::render(source, &FontPair::for_current_platform())
    }

    /// Loads a custom template from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Md2PdfError> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| Md2PdfError::TemplateReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_source(&source))
    }

    fn render(source: &str, fonts: &FontPair) -> Self {
        let preamble = source
            .replace(SANS_PLACEHOLDER, &fonts.sans)
            .replace(MONO_PLACEHOLDER, &fonts.mono);
        Self { preamble }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Preamble followed by `body`, separated by a blank line.
    pub fn apply(&self, body: &str) -> String {
        let mut out = String::with_capacity(self.preamble.len() + body.len() + 2);
        out.push_str(&self.preamble);
        if !self.preamble.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str(body);
        out
    }
}
