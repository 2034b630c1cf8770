//! Configuration types for batch Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The CLI maps its flags onto the builder;
//! library callers set only what they need and keep the defaults for the rest.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use crate::template::StyleTemplate;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "pdf_output";

/// An external program plus any leading arguments placed before the
/// arguments md2pdf adds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a leading argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The markdown converter: `pandoc`.
    pub fn pandoc() -> Self {
        Self::new("pandoc")
    }

    /// The typesetting compiler: `typst`.
    pub fn typst() -> Self {
        Self::new("typst")
    }

    /// Program name for messages.
    pub fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Configuration for a batch conversion.
///
/// # Example
/// ```rust
/// use md2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .output_dir("build/pdf")
///     .recursive(true)
///     .tool_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert!(config.recursive);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Where PDFs (and retained intermediates) are written. Default: `pdf_output`.
    pub output_dir: PathBuf,

    /// Descend into subdirectories of a directory input. Default: false.
    pub recursive: bool,

    /// Markdown → typst converter. Default: `pandoc`.
    pub converter: ToolCommand,

    /// typst → PDF compiler. Default: `typst`.
    pub compiler: ToolCommand,

    /// Preamble injected in front of every intermediate document.
    pub template: StyleTemplate,

    /// Per-invocation limit for each external tool. Default: None (wait forever).
    pub tool_timeout_secs: Option<u64>,

    /// Receives per-file events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            recursive: false,
            converter: ToolCommand::pandoc(),
            compiler: ToolCommand::typst(),
            template: StyleTemplate::default(),
            tool_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("recursive", &self.recursive)
            .field("converter", &self.converter)
            .field("compiler", &self.compiler)
            .field("template_len", &self.template.preamble().len())
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn converter(mut self, tool: ToolCommand) -> Self {
        self.config.converter = tool;
        self
    }

    pub fn compiler(mut self, tool: ToolCommand) -> Self {
        self.config.compiler = tool;
        self
    }

    pub fn template(mut self, template: StyleTemplate) -> Self {
        self.config.template = template;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.converter.program.is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "converter program must not be empty".into(),
            ));
        }
        if c.compiler.program.is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "compiler program must not be empty".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if c.tool_timeout_secs == Some(0) {
            return Err(Md2PdfError::InvalidConfig(
                "tool timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
