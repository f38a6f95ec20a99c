//! Agent file discovery and driver-name resolution.
//!
//! A bare agent name is searched through the project and user agent
//! directories and then `PATH`; a path with separators is taken as given.
//! The driver is named by the filename convention `<name>.<driver>.md`,
//! with an optional `.i.` infix marking an interactive run
//! (`fix.i.claude.md` runs `claude` interactively).

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::constants::MDFLOW_DIR;
use crate::core::MdflowError;
use crate::utils::platform::get_home_dir;

/// Where an agent file came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSource {
    /// A file on disk.
    Local(PathBuf),
    /// A remote URL, to be fetched (subject to the trust check).
    Remote(String),
}

/// Classify and resolve the target argument.
///
/// Search order for a bare name: as given in `cwd`, `<cwd>/.mdflow/`,
/// `<home>/.mdflow/`, then every `PATH` entry.
pub fn resolve_target(target: &str, cwd: &Path) -> Result<AgentSource> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(AgentSource::Remote(target.to_string()));
    }

    let as_given = cwd.join(target);
    if as_given.is_file() {
        return Ok(AgentSource::Local(as_given));
    }

    // Only bare names (no separators) get the search path.
    if !target.contains(['/', '\\']) {
        let mut candidates: Vec<PathBuf> = vec![cwd.join(MDFLOW_DIR).join(target)];
        if let Ok(home) = get_home_dir() {
            candidates.push(home.join(MDFLOW_DIR).join(target));
        }
        if let Some(path_var) = std::env::var_os("PATH") {
            for entry in std::env::split_paths(&path_var) {
                candidates.push(entry.join(target));
            }
        }
        for candidate in candidates {
            if candidate.is_file() {
                return Ok(AgentSource::Local(candidate));
            }
        }
    }

    Err(MdflowError::FileNotFound { path: target.to_string() }.into())
}

/// Parse the driver name and interactive marker from an agent filename.
///
/// Returns `(driver, interactive)`; `None` when the filename carries no
/// driver segment (`hello.md`).
#[must_use]
pub fn driver_from_filename(path: &Path) -> Option<(String, bool)> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".md")?;
    let parts: Vec<&str> = stem.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    let driver = parts[parts.len() - 1];
    if driver.is_empty() {
        return None;
    }
    let interactive = parts[..parts.len() - 1].contains(&"i");
    Some((driver.to_string(), interactive))
}

/// The conventional per-agent debug log path.
pub fn agent_log_path(agent_name: &str) -> Result<PathBuf> {
    let slug: String = agent_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    Ok(get_home_dir()?.join(MDFLOW_DIR).join("logs").join(slug).join("debug.log"))
}
