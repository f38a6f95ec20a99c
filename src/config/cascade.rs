//! The four-layer configuration cascade.
//!
//! Layers, in order of increasing precedence:
//!
//! 1. Built-in defaults (one entry per registered tool adapter)
//! 2. User global config at `~/.mdflow/config.yaml`
//! 3. Project config at the git root (first of `mdflow.config.yaml`,
//!    `.mdflow.yaml`, `.mdflow.json`)
//! 4. Project config in the current working directory (same names)
//!
//! Merging is shallow per top-level key, except the `commands` mapping
//! which is merged by command name; inside a command, override layers
//! replace keys wholesale. Parse errors at any layer degrade silently to
//! an empty layer. All functions here are pure re-reads; the orchestrator
//! calls the cascade once per invocation.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::value::{ConfigMap, ConfigValue};
use crate::constants::{MDFLOW_DIR, PROJECT_CONFIG_NAMES};
use crate::utils::platform::get_home_dir;

/// Merge one layer over another.
///
/// Top-level keys in `over` replace those in `base`, except `commands`,
/// whose sub-maps are merged per command name (inner keys replaced).
#[must_use]
pub fn merge_layers(base: &ConfigMap, over: &ConfigMap) -> ConfigMap {
    let mut merged = base.clone();
    for (key, value) in over.iter() {
        if key == "commands" {
            if let (Some(ConfigValue::Map(base_cmds)), ConfigValue::Map(over_cmds)) =
                (base.get("commands"), value)
            {
                merged.insert("commands", ConfigValue::Map(merge_commands(base_cmds, over_cmds)));
                continue;
            }
        }
        merged.insert(key.to_string(), value.clone());
    }
    merged
}

/// Merge the `commands` mappings of two layers by command name.
fn merge_commands(base: &ConfigMap, over: &ConfigMap) -> ConfigMap {
    let mut merged = base.clone();
    for (name, over_cmd) in over.iter() {
        match (base.get(name), over_cmd) {
            (Some(ConfigValue::Map(base_inner)), ConfigValue::Map(over_inner)) => {
                let mut inner = base_inner.clone();
                for (k, v) in over_inner.iter() {
                    inner.insert(k.to_string(), v.clone());
                }
                merged.insert(name.to_string(), ConfigValue::Map(inner));
            }
            _ => merged.insert(name.to_string(), over_cmd.clone()),
        }
    }
    merged
}

/// Find the nearest ancestor directory containing a `.git` entry.
///
/// Both a `.git` directory and a `.git` file count (the latter appears in
/// worktrees).
#[must_use]
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Read a YAML config file into a [`ConfigMap`], degrading to `None` on
/// absence or parse failure.
fn load_yaml_layer(path: &Path) -> Option<ConfigMap> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_yaml::from_str::<serde_yaml::Value>(&text) {
        Ok(value) => match ConfigValue::from_yaml(value) {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        },
        Err(e) => {
            debug!("Ignoring unparseable config layer {}: {e}", path.display());
            None
        }
    }
}

/// Read a JSON config file into a [`ConfigMap`], degrading like YAML.
fn load_json_layer(path: &Path) -> Option<ConfigMap> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => match ConfigValue::from_json(value) {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        },
        Err(e) => {
            debug!("Ignoring unparseable config layer {}: {e}", path.display());
            None
        }
    }
}

/// Load the first project config file found in `dir`.
#[must_use]
pub fn load_project_layer(dir: &Path) -> Option<ConfigMap> {
    for name in PROJECT_CONFIG_NAMES {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        return if name.ends_with(".json") {
            load_json_layer(&path)
        } else {
            load_yaml_layer(&path)
        };
    }
    None
}

/// Load the user global layer from `~/.mdflow/config.yaml`.
#[must_use]
pub fn load_user_layer() -> Option<ConfigMap> {
    let home = get_home_dir().ok()?;
    load_yaml_layer(&home.join(MDFLOW_DIR).join("config.yaml"))
}

/// Assemble the full cascade for an invocation rooted at `cwd`.
///
/// `builtins` is the layer contributed by the tool-adapter registry.
#[must_use]
pub fn load_cascade(builtins: &ConfigMap, cwd: &Path) -> ConfigMap {
    let mut merged = builtins.clone();

    if let Some(user) = load_user_layer() {
        merged = merge_layers(&merged, &user);
    }

    let git_root = find_git_root(cwd);
    if let Some(root) = &git_root {
        // The cwd layer below already covers a project rooted exactly here.
        if root != cwd {
            if let Some(project) = load_project_layer(root) {
                merged = merge_layers(&merged, &project);
            }
        }
    }

    if let Some(local) = load_project_layer(cwd) {
        merged = merge_layers(&merged, &local);
    }

    merged
}

/// Extract the per-command defaults for `driver` from a merged cascade.
#[must_use]
pub fn defaults_for(merged: &ConfigMap, driver: &str) -> ConfigMap {
    merged
        .get("commands")
        .and_then(ConfigValue::as_map)
        .and_then(|cmds| cmds.get(driver))
        .and_then(ConfigValue::as_map)
        .cloned()
        .unwrap_or_default()
}
