//! Persistent command-search-path providers.
//!
//! The installer never touches the process environment directly. It asks a
//! [`SearchPath`] whether the typst binary directory is already registered and,
//! if not, appends it. Three providers ship with the crate:
//!
//! | Provider             | Where the entry lives                              |
//! |----------------------|----------------------------------------------------|
//! | [`ShellProfile`]     | an `export PATH=…` line in `~/.zshrc`, `~/.bashrc`, … |
//! | [`WindowsUserPath`]  | the per-user `Path` environment variable           |
//! | [`MemorySearchPath`] | an in-memory list (tests, embedding)               |

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::InstallError;

/// A persistent, user-scoped list of directories searched for commands.
pub trait SearchPath {
    /// Returns `true` if `dir` is already registered.
    fn contains(&self, dir: &Path) -> Result<bool, InstallError>;

    /// Registers `dir`. Callers check [`SearchPath::contains`] first.
    fn append(&mut self, dir: &Path) -> Result<(), InstallError>;

    /// Human-readable location of the entry, e.g. `~/.zshrc`.
    fn describe(&self) -> String;
}

/// Picks the provider for the running OS.
///
/// Windows uses the user `Path` variable; everything else edits the profile
/// file of the login shell named by `$SHELL`.
pub fn default_search_path() -> Result<Box<dyn SearchPath>, InstallError> {
    if cfg!(windows) {
        Ok(Box::new(WindowsUserPath))
    } else {
        Ok(Box::new(ShellProfile::detect()?))
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// An in-memory search path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySearchPath {
    entries: Vec<PathBuf>,
}

impl MemorySearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }
}

impl SearchPath for MemorySearchPath {
    fn contains(&self, dir: &Path) -> Result<bool, InstallError> {
        Ok(self.entries.iter().any(|e| e == dir))
    }

    fn append(&mut self, dir: &Path) -> Result<(), InstallError> {
        self.entries.push(dir.to_path_buf());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory search path".to_string()
    }
}

// ── Unix shell profile ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellSyntax {
    Posix,
    Fish,
}

/// Registers directories by appending an export line to a shell profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProfile {
    profile: PathBuf,
    syntax: ShellSyntax,
}

impl ShellProfile {
    /// A POSIX-style profile (`export PATH="<dir>:$PATH"`).
    pub fn posix(profile: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
            syntax: ShellSyntax::Posix,
        }
    }

    /// A fish config file (`set -gx PATH "<dir>" $PATH`).
    pub fn fish(profile: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
            syntax: ShellSyntax::Fish,
        }
    }

    /// Chooses the profile file from `$SHELL`:
    /// zsh → `~/.zshrc`, bash → `~/.bashrc`, fish → `~/.config/fish/config.fish`,
    /// anything else → `~/.profile`.
    pub fn detect() -> Result<Self, InstallError> {
        let home = dirs::home_dir().ok_or_else(|| InstallError::SearchPath {
            target: "shell profile".into(),
            reason: "cannot determine the home directory".into(),
        })?;
        let shell = std::env::var("SHELL").unwrap_or_default();
        Ok(Self::for_shell(&shell, &home))
    }

    fn for_shell(shell: &str, home: &Path) -> Self {
        let name = shell.rsplit('/').next().unwrap_or_default();
        match name {
            "zsh" => Self::posix(home.join(".zshrc")),
            "bash" => Self::posix(home.join(".bashrc")),
            "fish" => Self::fish(home.join(".config").join("fish").join("config.fish")),
            _ => Self::posix(home.join(".profile")),
        }
    }

    pub fn profile(&self) -> &Path {
        &self.profile
    }

    fn export_line(&self, dir: &Path) -> String {
        match self.syntax {
            ShellSyntax::Posix => format!("export PATH=\"{}:$PATH\"", dir.display()),
            ShellSyntax::Fish => format!("set -gx PATH \"{}\" $PATH", dir.display()),
        }
    }

    fn error(&self, reason: impl std::fmt::Display) -> InstallError {
        InstallError::SearchPath {
            target: self.profile.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl SearchPath for ShellProfile {
    fn contains(&self, dir: &Path) -> Result<bool, InstallError> {
        let contents = match fs::read_to_string(&self.profile) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.error(e)),
        };
        let line = self.export_line(dir);
        Ok(contents.lines().any(|l| l.trim() == line))
    }

    fn append(&mut self, dir: &Path) -> Result<(), InstallError> {
        if let Some(parent) = self.profile.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.profile)
            .map_err(|e| self.error(e))?;
        writeln!(file, "\n# Added by md2pdf (typst)\n{}", self.export_line(dir))
            .map_err(|e| self.error(e))?;
        debug!("Appended {} to {}", dir.display(), self.profile.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.profile.display().to_string()
    }
}

// ── Windows user Path ────────────────────────────────────────────────────────

/// Registers directories in the per-user `Path` variable through PowerShell.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsUserPath;

impl WindowsUserPath {
    fn error(reason: impl std::fmt::Display) -> InstallError {
        InstallError::SearchPath {
            target: "user Path".into(),
            reason: reason.to_string(),
        }
    }

    fn powershell(script: &str, new_value: Option<&str>) -> Result<String, InstallError> {
        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
        if let Some(v) = new_value {
            // Passed through the environment so no quoting is needed.
            cmd.env("MD2PDF_NEW_PATH", v);
        }
        let output = cmd.output().map_err(Self::error)?;
        if !output.status.success() {
            return Err(Self::error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn current() -> Result<String, InstallError> {
        Self::powershell(
            "[Environment]::GetEnvironmentVariable('Path', 'User')",
            None,
        )
    }
}

/// Checks a `;`-separated Windows path list for `dir`, ignoring case and
/// trailing separators.
fn path_list_contains(list: &str, dir: &Path) -> bool {
    let wanted = normalise_windows_entry(&dir.to_string_lossy());
    list.split(';')
        .filter(|e| !e.trim().is_empty())
        .any(|e| normalise_windows_entry(e) == wanted)
}

fn normalise_windows_entry(entry: &str) -> String {
    entry
        .trim()
        .trim_end_matches(['\\', '/'])
        .to_ascii_lowercase()
}

impl SearchPath for WindowsUserPath {
    fn contains(&self, dir: &Path) -> Result<bool, InstallError> {
        Ok(path_list_contains(&Self::current()?, dir))
    }

    fn append(&mut self, dir: &Path) -> Result<(), InstallError> {
        let current = Self::current()?;
        let updated = if current.is_empty() {
            dir.display().to_string()
        } else {
            format!("{};{}", current.trim_end_matches(';'), dir.display())
        };
        Self::powershell(
            "[Environment]::SetEnvironmentVariable('Path', $env:MD2PDF_NEW_PATH, 'User')",
            Some(&updated),
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        "user Path environment variable".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_search_path_tracks_entries() {
        let mut sp = MemorySearchPath::with_entries(["/usr/bin"]);
        let dir = Path::new("/opt/typst");
        assert!(!sp.contains(dir).unwrap());
        sp.append(dir).unwrap();
        assert!(sp.contains(dir).unwrap());
        assert_eq!(sp.entries().len(), 2);
    }

    #[test]
    fn shell_profile_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let sp = ShellProfile::posix(tmp.path().join(".bashrc"));
        assert!(!sp.contains(Path::new("/opt/typst")).unwrap());
    }

    #[test]
    fn shell_profile_append_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join(".zshrc");
        fs::write(&profile, "alias ll='ls -l'\n").unwrap();

        let mut sp = ShellProfile::posix(&profile);
        let dir = Path::new("/home/me/.local/share/md2pdf/typst/typst-x86_64-unknown-linux-musl");
        sp.append(dir).unwrap();

        assert!(sp.contains(dir).unwrap());
        let contents = fs::read_to_string(&profile).unwrap();
        assert!(contents.starts_with("alias ll='ls -l'\n"));
        assert_eq!(contents.matches("export PATH=").count(), 1);
    }

    #[test]
    fn fish_profile_uses_set_syntax() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("fish").join("config.fish");
        let mut sp = ShellProfile::fish(&profile);
        sp.append(Path::new("/opt/typst")).unwrap();

        let contents = fs::read_to_string(&profile).unwrap();
        assert!(contents.contains("set -gx PATH \"/opt/typst\" $PATH"));
        assert!(sp.contains(Path::new("/opt/typst")).unwrap());
    }

    #[test]
    fn profile_is_chosen_from_shell() {
        let home = Path::new("/home/me");
        assert_eq!(
            ShellProfile::for_shell("/bin/zsh", home).profile(),
            Path::new("/home/me/.zshrc")
        );
        assert_eq!(
            ShellProfile::for_shell("/usr/bin/bash", home).profile(),
            Path::new("/home/me/.bashrc")
        );
        assert_eq!(
            ShellProfile::for_shell("/usr/local/bin/fish", home),
            ShellProfile::fish("/home/me/.config/fish/config.fish")
        );
        assert_eq!(
            ShellProfile::for_shell("", home).profile(),
            Path::new("/home/me/.profile")
        );
    }

    #[test]
    fn windows_path_list_matching() {
        let list = r"C:\Windows;C:\Users\me\AppData\Local\md2pdf\typst\typst-x86_64-pc-windows-msvc\;";
        assert!(path_list_contains(
            list,
            Path::new(r"c:\users\me\appdata\local\md2pdf\typst\typst-x86_64-pc-windows-msvc")
        ));
        assert!(!path_list_contains(list, Path::new(r"C:\Tools")));
        assert!(!path_list_contains("", Path::new(r"C:\Tools")));
    }
}
