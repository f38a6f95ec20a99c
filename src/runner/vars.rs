//! The template variable binding set.
//!
//! Bindings are layered, lowest precedence first:
//!
//! 1. front-matter defaults: `_name` keys (minus the internal set) and
//!    `$name` declarations (bound under both `name` and `_name`)
//! 2. CLI template-variable flags (`--_name value`)
//! 3. bare CLI positionals as `_1`, `_2`, ... plus `_args`
//! 4. piped stdin as `_stdin`
//!
//! Only `_`-prefixed names are prompt-fillable; anything else found free
//! in the body is presumed to be a driver flag name.

use std::collections::BTreeMap;

use crate::config::{ConfigMap, ConfigValue};
use crate::utils::shell;

/// Underscore keys that configure the run rather than the template.
pub const INTERNAL_KEYS: &[&str] = &["_interactive", "_i", "_cwd", "_subcommand"];

/// Assemble the binding set.
#[must_use]
pub fn build_bindings(
    config: &ConfigMap,
    template_flags: &[(String, String)],
    positionals: &[String],
    stdin: Option<&str>,
) -> BTreeMap<String, String> {
    let mut bindings: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in config.iter() {
        if INTERNAL_KEYS.contains(&key) {
            continue;
        }
        let Some(rendered) = value.as_arg_string() else { continue };
        if let Some(name) = key.strip_prefix('_') {
            bindings.insert(format!("_{name}"), rendered);
        } else if let Some(name) = key.strip_prefix('$') {
            // `$lang: en` declares a template variable, not a flag; numeric
            // forms are positional mappings and stay out of the bindings.
            if name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            bindings.insert(name.to_string(), rendered.clone());
            bindings.insert(format!("_{name}"), rendered);
        }
    }

    for (name, value) in template_flags {
        bindings.insert(name.clone(), value.clone());
    }

    for (i, value) in positionals.iter().enumerate() {
        bindings.insert(format!("_{}", i + 1), value.clone());
    }
    if !positionals.is_empty() {
        let formatted: Vec<String> = positionals.iter().map(|p| shell::quote(p)).collect();
        bindings.insert("_args".to_string(), formatted.join(" "));
    }

    if let Some(stdin) = stdin {
        bindings.insert("_stdin".to_string(), stdin.to_string());
    }

    bindings
}

/// Bind body-referenced config scalars so `{{ model }}` renders the
/// front-matter `model` value; such keys are then skipped by the argument
/// compiler as consumed.
pub fn bind_referenced_config(
    bindings: &mut BTreeMap<String, String>,
    config: &ConfigMap,
    free_vars: &std::collections::BTreeSet<String>,
) {
    for name in free_vars {
        if bindings.contains_key(name) || name.starts_with('_') || name.starts_with('$') {
            continue;
        }
        if let Some(value) = config.get(name) {
            if let Some(rendered) = value.as_arg_string() {
                bindings.insert(name.clone(), rendered);
            }
        }
    }
}
