//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, prints per-file status lines and the batch summary, and
//! runs the typst installer on `--install`.

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use md2pdf::{
    convert_batch, plan_batch, BatchProgressCallback, BatchSummary, ConversionConfig,
    ProgressCallback, StyleTemplate, ToolCommand, DEFAULT_OUTPUT_DIR,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use typst_auto::{InstallOptions, InstallReport, InstallStage, InstallTarget, PathUpdate};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback ────────────────────────────────────────────────────

/// Prints one coloured line per file, above an optional progress bar.
struct CliProgressCallback {
    /// `None` when `--no-progress` is set; lines then go straight to stderr.
    bar: Option<ProgressBar>,
    /// Per-file wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new(with_bar: bool) -> Arc<Self> {
        let bar = with_bar.then(|| {
            // Hidden until the batch starts so planning warnings print cleanly.
            let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(SPINNER_TICKS),
            );
            bar.set_prefix("Converting");
            bar
        });
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn elapsed(&self, index: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total_files as u64);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.enable_steady_tick(Duration::from_millis(80));
        }
        if total_files > 0 {
            self.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Converting {total_files} file(s)…"))
            ));
        }
    }

    fn on_job_start(&self, index: usize, _total: usize, source: &Path) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        if let Some(bar) = &self.bar {
            bar.set_message(source.display().to_string());
        }
    }

    fn on_job_complete(&self, index: usize, total: usize, destination: &Path) {
        let elapsed = self.elapsed(index);
        self.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            green("✓"),
            index,
            total,
            destination.display(),
            elapsed,
        ));
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_job_error(&self, index: usize, total: usize, _source: &Path, error: &str) {
        let elapsed = self.elapsed(index);
        // Keep one line per file; full detail is in the summary.
        let msg = match error.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            elapsed,
        ));
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_batch_complete(&self, _total_files: usize, _success_count: usize) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one file into ./pdf_output/notes.pdf
  md2pdf notes.md

  # Convert every .md in a directory tree into build/pdf
  md2pdf -r docs/ build/pdf

  # List what would be converted, without converting
  md2pdf --dry-run -r docs/

  # Use your own typst preamble
  md2pdf --template my-style.typ notes.md

  # Install typst for this user and add it to PATH
  md2pdf --install

REQUIREMENTS:
  pandoc   https://pandoc.org/installing.html
  typst    installed by `md2pdf --install`, or https://github.com/typst/typst

OUTPUT:
  <OUTPUT_DIR>/<name>.pdf for every <name>.md. When typst fails on a file,
  the styled <OUTPUT_DIR>/<name>.typ is kept so the error can be reproduced
  with `typst compile`. Failed files do not change the exit status; check the
  summary.

ENVIRONMENT VARIABLES:
  MD2PDF_OUTPUT           Default output directory
  MD2PDF_CONVERTER        Markdown converter program (default: pandoc)
  MD2PDF_COMPILER         typst program (default: typst)
  MD2PDF_TEMPLATE         Path to a custom typst preamble
  MD2PDF_TIMEOUT          Per-tool timeout in seconds
  TYPST_AUTO_INSTALL_DIR  Where --install puts typst
  RUST_LOG                Log filter, e.g. md2pdf=debug
"#;

/// Convert Markdown files to styled PDFs via pandoc and typst.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files to styled PDFs via pandoc and typst",
    long_about = "Convert a Markdown file, or every Markdown file in a directory, to a styled \
PDF. Each file is converted to typst markup by pandoc, given a fixed styling preamble, and \
compiled by typst.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file or directory to convert.
    input: Option<PathBuf>,

    /// Directory for the generated PDFs [default: pdf_output].
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for the generated PDFs (OUTPUT_DIR wins when both are given).
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Also convert Markdown files in subdirectories.
    #[arg(short, long)]
    recursive: bool,

    /// Install typst for this user and add it to the command search path, then exit.
    #[arg(long, conflicts_with_all = ["input", "output_dir", "recursive", "dry_run", "json"])]
    install: bool,

    /// With --install: download again even if typst is already installed.
    #[arg(long, requires = "install")]
    force: bool,

    /// With --install: install from a downloaded release archive instead of the network.
    #[arg(long, value_name = "FILE", requires = "install", conflicts_with = "force")]
    archive: Option<PathBuf>,

    /// typst file used as the styling preamble instead of the builtin one.
    #[arg(long, value_name = "FILE", env = "MD2PDF_TEMPLATE")]
    template: Option<PathBuf>,

    /// Markdown converter program.
    #[arg(long, value_name = "PROG", env = "MD2PDF_CONVERTER", default_value = "pandoc")]
    converter: String,

    /// typst program.
    #[arg(long, value_name = "PROG", env = "MD2PDF_COMPILER", default_value = "typst")]
    compiler: String,

    /// Kill a tool that runs longer than this many seconds (default: no limit).
    #[arg(long, value_name = "SECS", env = "MD2PDF_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Print the planned conversions and exit.
    #[arg(long)]
    dry_run: bool,

    /// Print the batch summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar (per-file lines are still printed).
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Only print errors and the summary.
    #[arg(short, long, env = "MD2PDF_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    if cli.install {
        reject_conversion_flags(&matches);
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Per-file status lines already say what happened, so only warnings
    // (name collisions, skipped entries, failed cleanup) are logged next to
    // them.
    let status_lines = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if status_lines {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.install {
        return run_install(&cli);
    }

    let Some(input) = cli.input.clone() else {
        bail!("No input given. Pass a Markdown file or directory, or --install.\nTry `md2pdf --help`.");
    };

    let progress_cb: Option<ProgressCallback> = if status_lines {
        Some(CliProgressCallback::new(!cli.no_progress) as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let jobs = plan_batch(&input, &config).context("Cannot plan conversion")?;
        for job in &jobs {
            println!("{} → {}", job.source().display(), job.destination().display());
        }
        eprintln!("{} file(s) would be converted", jobs.len());
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let summary = convert_batch(&input, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else {
        print_summary(&input, &summary);
    }

    // Per-file failures are reported in the summary only; the run itself
    // completed, so the exit status stays 0.
    Ok(())
}

/// Exits with a usage error when `--install` is combined with a conversion
/// setting typed on the command line. The same settings coming from
/// `MD2PDF_*` variables or defaults are ignored.
fn reject_conversion_flags(matches: &ArgMatches) {
    const CONVERSION_ONLY: [&str; 5] = ["output", "template", "converter", "compiler", "timeout"];
    for id in CONVERSION_ONLY {
        if matches.value_source(id) == Some(ValueSource::CommandLine) {
            Cli::command()
                .error(
                    ErrorKind::ArgumentConflict,
                    format!("--{id} cannot be used with --install"),
                )
                .exit();
        }
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let template = match cli.template {
        Some(ref path) => StyleTemplate::from_file(path).context("Invalid --template")?,
        None => StyleTemplate::builtin(),
    };
    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| cli.output.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let mut builder = ConversionConfig::builder()
        .output_dir(output_dir)
        .recursive(cli.recursive)
        .converter(ToolCommand::new(&cli.converter))
        .compiler(ToolCommand::new(&cli.compiler))
        .template(template);

    if let Some(secs) = cli.timeout {
        builder = builder.tool_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(input: &Path, summary: &BatchSummary) {
    let total = summary.total();
    let out = summary.output_directory.display().to_string();

    if total == 0 {
        eprintln!(
            "{} No Markdown files found in {}  (0/0)",
            yellow("⚠"),
            bold(&input.display().to_string())
        );
        return;
    }

    if summary.failure_count == 0 {
        eprintln!(
            "{} {} file(s) converted  {}  →  {}",
            green("✔"),
            bold(&summary.success_count.to_string()),
            dim(&format!("{}ms", summary.duration_ms)),
            bold(&out),
        );
        return;
    }

    eprintln!(
        "{} {}/{} file(s) converted  ({} failed)  {}  →  {}",
        if summary.success_count == 0 {
            red("✘")
        } else {
            yellow("⚠")
        },
        bold(&summary.success_count.to_string()),
        total,
        red(&summary.failure_count.to_string()),
        dim(&format!("{}ms", summary.duration_ms)),
        bold(&out),
    );
    for failure in &summary.failures {
        eprintln!("   {} {}", red("✗"), failure);
    }
}

// ── Installer ────────────────────────────────────────────────────────────────

fn run_install(cli: &Cli) -> Result<()> {
    let mut search_path = typst_auto::default_search_path()
        .context("Cannot find a command search path to update")?;

    let report = match cli.archive {
        Some(ref archive) => {
            let target = InstallTarget::detect().context("Cannot install typst here")?;
            tokio::task::block_in_place(|| {
                typst_auto::install_from_archive(archive, &target, search_path.as_mut())
            })
        }
        None => install_with_progress(cli, search_path.as_mut()),
    }
    .context("typst installation failed")?;

    print_install_report(&report);
    Ok(())
}

fn install_with_progress(
    cli: &Cli,
    search_path: &mut dyn typst_auto::SearchPath,
) -> Result<InstallReport, typst_auto::InstallError> {
    let options = InstallOptions {
        force: cli.force,
        install_dir: None,
    };

    if cli.quiet {
        // Silent install; errors still propagate.
        return tokio::task::block_in_place(|| {
            typst_auto::install(&options, search_path, None, None)
        });
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS),
    );
    dl_bar.set_prefix(format!("typst {}", typst_auto::TYPST_VERSION));
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    let on_stage = move |stage: InstallStage| {
        if stage != InstallStage::Done {
            bar.println(format!("{} {}", cyan("◆"), bold(&format!("{stage}…"))));
        }
    };
    let bar = dl_bar.clone();
    let on_progress = move |downloaded: u64, total: Option<u64>| {
        if let Some(t) = total {
            if bar.length().unwrap_or(0) != t {
                bar.set_length(t);
            }
        }
        bar.set_position(downloaded);
    };

    // block_in_place keeps the callbacks' borrows valid while moving the
    // blocking download off the async worker.
    let result = tokio::task::block_in_place(|| {
        typst_auto::install(
            &options,
            search_path,
            Some(&on_stage as &dyn Fn(InstallStage)),
            Some(&on_progress as &dyn Fn(u64, Option<u64>)),
        )
    });
    dl_bar.finish_and_clear();
    result
}

fn print_install_report(report: &InstallReport) {
    let binary = report.target.binary_path();
    if report.downloaded {
        eprintln!(
            "{} typst {} installed at {}",
            green("✔"),
            typst_auto::TYPST_VERSION,
            bold(&binary.display().to_string())
        );
    } else {
        eprintln!(
            "{} typst already installed at {}",
            green("✔"),
            bold(&binary.display().to_string())
        );
    }
    match report.path_update {
        PathUpdate::Added => eprintln!(
            "   Added {} to {}. Open a new shell to pick it up.",
            report.target.binary_dir().display(),
            report.search_path
        ),
        PathUpdate::AlreadyPresent => eprintln!(
            "   {} is already on the search path ({}).",
            report.target.binary_dir().display(),
            report.search_path
        ),
    }
}
