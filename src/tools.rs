//! Locating and running the external converter and compiler.

use crate::config::{ConversionConfig, ToolCommand};
use crate::error::{Md2PdfError, MissingTool};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Lines of tool stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 6;

/// Checks that both tools can be found and returns a copy of `config` whose
/// programs are absolute paths.
///
/// A `typst` that is not on `PATH` is also looked up in the `typst-auto`
/// install directory, so a fresh `--install` works before the shell reloads
/// its profile. Every missing tool is reported, not just the first.
pub fn resolve_tools(config: &ConversionConfig) -> Result<ConversionConfig, Md2PdfError> {
    let mut missing = Vec::new();
    let mut resolved = config.clone();

    match locate(&config.converter) {
        Some(path) => resolved.converter.program = path.into_os_string(),
        None => missing.push(missing_tool(&config.converter)),
    }

    let compiler = locate(&config.compiler).or_else(|| {
        if config.compiler == ToolCommand::typst() {
            typst_auto::installed_binary()
        } else {
            None
        }
    });
    match compiler {
        Some(path) => resolved.compiler.program = path.into_os_string(),
        None => missing.push(missing_tool(&config.compiler)),
    }

    if !missing.is_empty() {
        return Err(Md2PdfError::MissingTools(missing));
    }
    debug!(
        "Using converter {} and compiler {}",
        resolved.converter.display_name(),
        resolved.compiler.display_name()
    );
    Ok(resolved)
}

fn locate(tool: &ToolCommand) -> Option<PathBuf> {
    which::which(&tool.program).ok()
}

fn missing_tool(tool: &ToolCommand) -> MissingTool {
    let name = tool.display_name();
    let stem = std::path::Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let hint = match stem.as_str() {
        "pandoc" => "Install it from https://pandoc.org/installing.html".to_string(),
        "typst" => "Run `md2pdf --install`, or see https://github.com/typst/typst#installation"
            .to_string(),
        _ => "Install it or pass its full path.".to_string(),
    };
    MissingTool { tool: name, hint }
}

/// Runs `tool` with its leading arguments followed by `args`.
///
/// Returns `Err(detail)` when the program cannot be started, exits non-zero,
/// or outlives `timeout` (the child is killed). `detail` ends with the last
/// lines of the tool's stderr.
pub(crate) async fn run_tool<I, S>(
    tool: &ToolCommand,
    args: I,
    timeout: Option<Duration>,
) -> Result<(), String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = tool.display_name();
    let mut cmd = Command::new(&tool.program);
    cmd.args(&tool.args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running {:?}", cmd.as_std());

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(result) => result,
            Err(_) => return Err(format!("{name} timed out after {:.1}s", limit.as_secs_f64())),
        },
        None => cmd.output().await,
    }
    .map_err(|e| format!("failed to run {name}: {e}"))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = stderr_tail(&String::from_utf8_lossy(&output.stderr));
    if stderr.is_empty() {
        Err(format!("{name} exited with {}", output.status))
    } else {
        Err(format!("{name} exited with {}: {stderr}", output.status))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
