//! Front-matter-to-argv compilation.
//!
//! The merged config is an open mapping: most keys become flags for the
//! downstream driver, but several key families are internal and must never
//! leak into argv. The skip rules run in a fixed order:
//!
//! 1. the system set (`args`)
//! 2. `$N` positional mappings (consumed by the positional section)
//! 3. other `$`-keys (template-variable declarations)
//! 4. `_`-keys (internal directives and template-variable defaults)
//! 5. keys consumed as template variables by the body
//! 6. `env` in mapping form (process-environment additions, not a flag)
//! 7. `null` / `false` values
//!
//! Whatever survives is emitted: `true` as a bare flag, lists once per
//! element, scalars as `--key value`. Single-character keys use a single
//! dash. The positional section follows, honoring `$N` remappings, and a
//! `_subcommand` prefix (string or list) is prepended to everything.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::{ConfigMap, ConfigValue};

/// Keys reserved by the outer tool, never forwarded.
const SYSTEM_KEYS: &[&str] = &["args"];

static POSITIONAL_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\$(\d+)$").unwrap());

/// Render a key as its flag form: `-k` for single characters, `--key`
/// otherwise.
fn flag_for(key: &str) -> String {
    if key.chars().count() == 1 {
        format!("-{key}")
    } else {
        format!("--{key}")
    }
}

/// Compile the driver argv from merged config and positionals.
///
/// `consumed_vars` is the set of variable names the template actually
/// referenced; matching config keys are presumed spent on rendering and
/// are not forwarded. `positionals` is the prompt body followed by any
/// unconsumed CLI positionals.
#[must_use]
pub fn compile_argv(
    config: &ConfigMap,
    consumed_vars: &BTreeSet<String>,
    positionals: &[String],
) -> Vec<String> {
    let mut argv: Vec<String> = Vec::new();

    for (key, value) in config.iter() {
        if SYSTEM_KEYS.contains(&key) {
            continue;
        }
        if POSITIONAL_KEY.is_match(key) {
            continue;
        }
        if key.starts_with('$') {
            continue;
        }
        if key.starts_with('_') {
            continue;
        }
        if consumed_vars.contains(key) {
            continue;
        }
        if key == "env" && value.as_map().is_some() {
            continue;
        }
        if value.is_null() || value.is_false() {
            continue;
        }
        match value {
            ConfigValue::Bool(true) => argv.push(flag_for(key)),
            ConfigValue::List(items) => {
                for item in items {
                    if let Some(rendered) = item.as_arg_string() {
                        argv.push(flag_for(key));
                        argv.push(rendered);
                    }
                }
            }
            ConfigValue::Map(_) => {
                debug!("Skipping mapping-valued key '{key}': no argument form");
            }
            other => {
                if let Some(rendered) = other.as_arg_string() {
                    argv.push(flag_for(key));
                    argv.push(rendered);
                }
            }
        }
    }

    for (i, value) in positionals.iter().enumerate() {
        let mapping = config
            .get(&format!("${}", i + 1))
            .and_then(ConfigValue::as_arg_string);
        match mapping {
            Some(flag_name) => {
                argv.push(flag_for(&flag_name));
                argv.push(value.clone());
            }
            None => argv.push(value.clone()),
        }
    }

    let mut prefixed = subcommand_prefix(config);
    prefixed.append(&mut argv);
    prefixed
}

/// The `_subcommand` prefix as a vector: empty, one element, or a list.
#[must_use]
pub fn subcommand_prefix(config: &ConfigMap) -> Vec<String> {
    match config.get("_subcommand") {
        Some(ConfigValue::List(items)) => {
            items.iter().filter_map(ConfigValue::as_arg_string).collect()
        }
        Some(other) => other.as_arg_string().into_iter().collect(),
        None => Vec::new(),
    }
}

/// Extract the mapping form of `env` as child-process environment
/// additions. The list/string forms pass through argv instead.
#[must_use]
pub fn env_additions(config: &ConfigMap) -> Vec<(String, String)> {
    let Some(env) = config.get("env").and_then(ConfigValue::as_map) else {
        return Vec::new();
    };
    env.iter()
        .filter_map(|(k, v)| v.as_arg_string().map(|value| (k.to_string(), value)))
        .collect()
}
