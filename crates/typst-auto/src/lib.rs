//! # typst-auto
//!
//! Download, unpack and register a pinned [typst](https://github.com/typst/typst)
//! release so `md2pdf` can compile PDFs without a manual typst install.
//!
//! ## How it works
//!
//! [`install`] walks one attempt through a fixed sequence of stages:
//!
//! 1. **DetectingPlatform**: map `std::env::consts::{OS, ARCH}` to the typst
//!    release asset for this machine.
//! 2. **Downloading**: stream the archive into a temp file.
//! 3. **Extracting**: unpack it into the per-user install directory.
//! 4. **UpdatingPath**: append the binary directory to the persistent
//!    command search path, unless it is already there.
//!
//! Any stage can fail; nothing is retried. The search path is only touched once
//! extraction succeeded, and the downloaded archive is removed whatever happens.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use typst_auto::{default_search_path, install, InstallOptions};
//!
//! let mut search_path = default_search_path().expect("no search path provider");
//! let report = install(&InstallOptions::default(), search_path.as_mut(), None, None)
//!     .expect("install failed");
//! println!("typst installed at {}", report.target.binary_path().display());
//! ```
//!
//! ## Platform support
//!
//! | OS      | Arch    | Asset                                       |
//! |---------|---------|---------------------------------------------|
//! | Linux   | x86_64  | `typst-x86_64-unknown-linux-musl.tar.xz`    |
//! | Linux   | aarch64 | `typst-aarch64-unknown-linux-musl.tar.xz`   |
//! | Linux   | arm     | `typst-armv7-unknown-linux-musleabi.tar.xz` |
//! | macOS   | x86_64  | `typst-x86_64-apple-darwin.tar.xz`          |
//! | macOS   | arm64   | `typst-aarch64-apple-darwin.tar.xz`         |
//! | Windows | x86_64  | `typst-x86_64-pc-windows-msvc.zip`          |
//! | Windows | aarch64 | `typst-aarch64-pc-windows-msvc.zip`         |
//!
//! ## Environment variable overrides
//!
//! - `TYPST_AUTO_INSTALL_DIR`: override the default install directory.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod search_path;

pub use search_path::{default_search_path, MemorySearchPath, SearchPath, ShellProfile, WindowsUserPath};

// ── Public constants ─────────────────────────────────────────────────────────

/// The typst release installed by [`install`].
pub const TYPST_VERSION: &str = "0.13.1";

/// GitHub release base URL.
const BASE_URL: &str = "https://github.com/typst/typst/releases/download";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by typst-auto operations.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The current OS/architecture combination has no typst release asset.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Could not create the install directory.
    #[error("Install directory error for '{path}': {source}")]
    InstallDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network download failed or the server answered with a non-2xx status.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// The archive is corrupt, unreadable, or lacks the typst binary.
    #[error("Archive extraction failed: {0}")]
    ExtractionFailed(String),

    /// The persistent search path could not be read or written.
    #[error("Could not update the command search path ({target}): {reason}")]
    SearchPath { target: String, reason: String },
}

// ── Platform resolution ──────────────────────────────────────────────────────

/// Archive format of a release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarXz,
    Zip,
}

impl ArchiveKind {
    /// File suffix of the asset, including the leading dot.
    pub fn suffix(self) -> &'static str {
        match self {
            ArchiveKind::TarXz => ".tar.xz",
            ArchiveKind::Zip => ".zip",
        }
    }
}

/// A supported platform: its release identifier, archive format and the
/// binary's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Target triple used in the asset name, e.g. `x86_64-apple-darwin`.
    pub id: &'static str,
    pub archive: ArchiveKind,
    pub binary_name: &'static str,
}

const fn unix(id: &'static str) -> Platform {
    Platform {
        id,
        archive: ArchiveKind::TarXz,
        binary_name: "typst",
    }
}

const fn windows(id: &'static str) -> Platform {
    Platform {
        id,
        archive: ArchiveKind::Zip,
        binary_name: "typst.exe",
    }
}

/// Maps an OS/architecture pair (as spelled by `std::env::consts`) to a
/// release platform.
pub fn platform_for(os: &str, arch: &str) -> Result<Platform, InstallError> {
    match (os, arch) {
        ("linux", "x86_64") => Ok(unix("x86_64-unknown-linux-musl")),
        ("linux", "aarch64") => Ok(unix("aarch64-unknown-linux-musl")),
        ("linux", "arm") => Ok(unix("armv7-unknown-linux-musleabi")),
        ("macos", "x86_64") => Ok(unix("x86_64-apple-darwin")),
        ("macos", "aarch64") => Ok(unix("aarch64-apple-darwin")),
        ("windows", "x86_64") => Ok(windows("x86_64-pc-windows-msvc")),
        ("windows", "aarch64") => Ok(windows("aarch64-pc-windows-msvc")),
        (os, arch) => Err(InstallError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

/// The platform of the running process.
pub fn detect_platform() -> Result<Platform, InstallError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Install directory resolution ─────────────────────────────────────────────

/// Returns the fixed per-user install directory.
///
/// Default locations:
/// - **macOS**: `~/Library/Application Support/md2pdf/typst/`
/// - **Linux**: `~/.local/share/md2pdf/typst/`
/// - **Windows**: `%LOCALAPPDATA%\md2pdf\typst\`
///
/// Override by setting `TYPST_AUTO_INSTALL_DIR`.
pub fn install_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("TYPST_AUTO_INSTALL_DIR") {
        return PathBuf::from(override_dir);
    }

    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("md2pdf").join("typst")
}

/// Everything an install attempt needs to know about where things come from
/// and where they go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub platform_id: String,
    pub download_url: String,
    pub install_dir: PathBuf,
    /// Directory inside `install_dir` that holds the binary once extracted.
    pub binary_subdir: PathBuf,
    pub archive: ArchiveKind,
    pub binary_name: String,
}

impl InstallTarget {
    pub fn for_platform(platform: Platform, install_dir: impl Into<PathBuf>) -> Self {
        let asset = format!("typst-{}", platform.id);
        Self {
            platform_id: platform.id.to_string(),
            download_url: format!(
                "{}/v{}/{}{}",
                BASE_URL,
                TYPST_VERSION,
                asset,
                platform.archive.suffix()
            ),
            install_dir: install_dir.into(),
            binary_subdir: PathBuf::from(asset),
            archive: platform.archive,
            binary_name: platform.binary_name.to_string(),
        }
    }

    /// Target for the running platform and the default [`install_dir`].
    pub fn detect() -> Result<Self, InstallError> {
        Ok(Self::for_platform(detect_platform()?, install_dir()))
    }

    /// The directory registered on the search path.
    pub fn binary_dir(&self) -> PathBuf {
        self.install_dir.join(&self.binary_subdir)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.binary_dir().join(&self.binary_name)
    }

    pub fn is_installed(&self) -> bool {
        self.binary_path().is_file()
    }
}

/// Returns the path of a previously installed typst binary, if any.
pub fn installed_binary() -> Option<PathBuf> {
    InstallTarget::detect()
        .ok()
        .filter(InstallTarget::is_installed)
        .map(|t| t.binary_path())
}

// ── Install state machine ────────────────────────────────────────────────────

/// Stages of a single install attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    DetectingPlatform,
    Downloading,
    Extracting,
    UpdatingPath,
    Done,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallStage::DetectingPlatform => "detecting platform",
            InstallStage::Downloading => "downloading",
            InstallStage::Extracting => "extracting",
            InstallStage::UpdatingPath => "updating search path",
            InstallStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Knobs for [`install`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Download and extract even when the binary is already present.
    pub force: bool,
    /// Install somewhere other than [`install_dir`].
    pub install_dir: Option<PathBuf>,
}

/// What happened to the search path entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathUpdate {
    Added,
    AlreadyPresent,
}

/// Outcome of a successful install attempt.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub target: InstallTarget,
    /// `false` when an existing install was reused.
    pub downloaded: bool,
    pub path_update: PathUpdate,
    /// Where the entry lives, from [`SearchPath::describe`].
    pub search_path: String,
}

/// Stage callback type accepted by [`install`].
pub type StageCallback<'a> = Option<&'a dyn Fn(InstallStage)>;

/// Download-progress callback: `(bytes_downloaded, total_bytes_option)`.
pub type ProgressCallback<'a> = Option<&'a dyn Fn(u64, Option<u64>)>;

/// Installs the pinned typst release for the running platform.
///
/// `on_stage` is called as each stage begins; `on_progress` receives
/// `(bytes_downloaded, total_size_option)` during the download.
pub fn install(
    options: &InstallOptions,
    search_path: &mut dyn SearchPath,
    on_stage: StageCallback<'_>,
    on_progress: ProgressCallback<'_>,
) -> Result<InstallReport, InstallError> {
    let stage = |s: InstallStage| {
        debug!("typst install: {s}");
        if let Some(cb) = on_stage {
            cb(s);
        }
    };

    stage(InstallStage::DetectingPlatform);
    let platform = detect_platform()?;
    let dir = options.install_dir.clone().unwrap_or_else(install_dir);
    let target = InstallTarget::for_platform(platform, dir);
    info!(
        "Installing typst {} for {} into {}",
        TYPST_VERSION,
        target.platform_id,
        target.install_dir.display()
    );

    let reuse = target.is_installed() && !options.force;

    // Both stages are reported even when an existing install is reused.
    stage(InstallStage::Downloading);
    let archive = if reuse {
        info!(
            "typst already present at {}; skipping download",
            target.binary_path().display()
        );
        None
    } else {
        Some(download_archive(&target.download_url, target.archive, on_progress)?)
    };

    stage(InstallStage::Extracting);
    let downloaded = match archive {
        None => false,
        Some(archive) => {
            let extracted = extract_archive(archive.path(), &target);
            if let Err(e) = archive.close() {
                warn!("Could not remove downloaded archive: {e}");
            }
            extracted?;
            true
        }
    };

    stage(InstallStage::UpdatingPath);
    let path_update = register_binary_dir(&target, search_path)?;

    stage(InstallStage::Done);
    Ok(InstallReport {
        target,
        downloaded,
        path_update,
        search_path: search_path.describe(),
    })
}

/// Installs from an archive already on disk (offline installs).
///
/// The archive must match `target.archive`; it is left untouched.
pub fn install_from_archive(
    archive_path: &Path,
    target: &InstallTarget,
    search_path: &mut dyn SearchPath,
) -> Result<InstallReport, InstallError> {
    extract_archive(archive_path, target)?;
    let path_update = register_binary_dir(target, search_path)?;
    Ok(InstallReport {
        target: target.clone(),
        downloaded: false,
        path_update,
        search_path: search_path.describe(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Streams a URL into a temp file, calling `on_progress` every 64 KiB.
fn download_archive(
    url: &str,
    kind: ArchiveKind,
    on_progress: ProgressCallback<'_>,
) -> Result<NamedTempFile, InstallError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("typst-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| InstallError::DownloadFailed(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| InstallError::DownloadFailed(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(InstallError::DownloadFailed(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let mut file = tempfile::Builder::new()
        .prefix("typst-")
        .suffix(kind.suffix())
        .tempfile()
        .map_err(|e| InstallError::DownloadFailed(format!("Cannot create temp file: {e}")))?;

    let total = response.content_length();
    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                file.write_all(&chunk[..n])
                    .map_err(|e| InstallError::DownloadFailed(format!("Write error: {e}")))?;
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(InstallError::DownloadFailed(format!("Read error: {e}")));
            }
        }
    }

    file.flush()
        .map_err(|e| InstallError::DownloadFailed(format!("Write error: {e}")))?;
    debug!("Downloaded {downloaded} bytes to {}", file.path().display());
    Ok(file)
}

/// Unpacks the whole archive into `target.install_dir` and checks that the
/// binary landed where expected.
fn extract_archive(archive_path: &Path, target: &InstallTarget) -> Result<(), InstallError> {
    std::fs::create_dir_all(&target.install_dir).map_err(|source| InstallError::InstallDir {
        path: target.install_dir.clone(),
        source,
    })?;

    let file = File::open(archive_path).map_err(|e| {
        InstallError::ExtractionFailed(format!("Cannot open {}: {e}", archive_path.display()))
    })?;

    match target.archive {
        ArchiveKind::TarXz => {
            let xz = xz2::read::XzDecoder::new(BufReader::new(file));
            tar::Archive::new(xz)
                .unpack(&target.install_dir)
                .map_err(|e| InstallError::ExtractionFailed(e.to_string()))?;
        }
        ArchiveKind::Zip => {
            zip::ZipArchive::new(file)
                .and_then(|mut archive| archive.extract(&target.install_dir))
                .map_err(|e| InstallError::ExtractionFailed(e.to_string()))?;
        }
    }

    if !target.is_installed() {
        return Err(InstallError::ExtractionFailed(format!(
            "'{}' not found in archive",
            target.binary_subdir.join(&target.binary_name).display()
        )));
    }
    Ok(())
}

fn register_binary_dir(
    target: &InstallTarget,
    search_path: &mut dyn SearchPath,
) -> Result<PathUpdate, InstallError> {
    let dir = target.binary_dir();
    if search_path.contains(&dir)? {
        debug!("{} already on {}", dir.display(), search_path.describe());
        return Ok(PathUpdate::AlreadyPresent);
    }
    search_path.append(&dir)?;
    info!("Added {} to {}", dir.display(), search_path.describe());
    Ok(PathUpdate::Added)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
