//! Platform-specific utilities and cross-platform compatibility helpers.
//!
//! mdflow behaves identically on Windows, macOS, and Linux; this module
//! encapsulates the few places where the platforms genuinely differ:
//!
//! - Home directory resolution
//! - Tilde expansion in user-supplied paths
//! - The shell used to run inline commands (`cmd.exe` vs `sh`)
//!
//! # Examples
//!
//! ```rust,no_run
//! use mdflow::utils::platform::{get_home_dir, expand_tilde, shell_command};
//!
//! # fn example() -> anyhow::Result<()> {
//! let home = get_home_dir()?;
//! let agents = expand_tilde("~/.mdflow")?;
//! let (shell, prefix) = shell_command();
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::MdflowError;

/// Gets the home directory path for the current user.
///
/// # Errors
///
/// A `ConfigurationError` naming the environment variable that would fix
/// the lookup (`HOME` on Unix, `USERPROFILE` on Windows).
pub fn get_home_dir() -> Result<PathBuf> {
    match dirs::home_dir() {
        Some(home) => Ok(home),
        None => {
            let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
            Err(MdflowError::ConfigurationError {
                message: format!("cannot locate the home directory; is {var} set?"),
            }
            .into())
        }
    }
}

/// Expands a leading `~/` to the user's home directory.
///
/// Paths without a tilde prefix pass through unchanged. Only the `~/` form
/// is supported; `~user/...` is rejected.
pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    if path.starts_with('~') && path != "~" && !path.starts_with("~/") {
        return Err(anyhow::anyhow!(
            "Invalid path: {path}\n\
             Tilde expansion only supports '~/' for the home directory."
        ));
    }
    Ok(PathBuf::from(shellexpand::tilde(path).into_owned()))
}

/// Returns the platform shell and the argv prefix that makes it run a
/// command string.
///
/// - Windows: `("cmd.exe", ["/d", "/s", "/c"])`
/// - Unix: `("sh", ["-c"])`
#[must_use]
pub fn shell_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(windows) {
        ("cmd.exe", &["/d", "/s", "/c"])
    } else {
        ("sh", &["-c"])
    }
}

/// Resolve a path to its canonical form, following symlinks.
///
/// Used by the import resolver for cycle detection: two different spellings
/// of the same file (or a symlink chain) canonicalize to one path.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(path)
        .map_err(|e| anyhow::anyhow!("Cannot canonicalize {}: {e}", path.display()))?;
    // Windows canonicalization yields verbatim `\\?\` paths; strip the
    // prefix so canonical paths stay comparable and displayable.
    if cfg!(windows) {
        let display = canonical.to_string_lossy();
        if let Some(plain) = display.strip_prefix(r"\\?\") {
            return Ok(PathBuf::from(plain));
        }
    }
    Ok(canonical)
}

/// The dotenv layer names the external env-file loader would read for the
/// current `NODE_ENV` (default `development`).
#[must_use]
pub fn env_file_names() -> [String; 2] {
    let env = std::env::var("NODE_ENV")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "development".to_string());
    [format!(".env.{env}"), format!(".env.{env}.local")]
}
