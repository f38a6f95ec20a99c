//! Extraction of outer-tool flags from the passthrough argument vector.
//!
//! Everything after the agent file belongs to the driver except:
//!
//! - *hijacked flags* (`--_command`, `--_dry-run`, `--_trust`,
//!   `--_no-cache`, `--_interactive`, `--_cwd`) consumed by mdflow itself
//! - *template-variable flags* (`--_<name> <value>`, `--_<name>=<value>`,
//!   bare `--_<name>` meaning `"true"`) that feed the binding set
//!
//! The rest splits into flag overrides (merged over front matter and
//! compiled into driver argv) and bare positionals (bound to `_1`, `_2`,
//! ... for the template).

use std::path::PathBuf;

use crate::config::{ConfigMap, ConfigValue};

/// Flags consumed by the outer tool, never forwarded.
#[derive(Debug, Clone, Default)]
pub struct HijackedFlags {
    /// `--_command <name>` / `-_c <name>`: explicit driver choice.
    pub command: Option<String>,
    /// `--_dry-run`: print the plan instead of spawning the driver.
    pub dry_run: bool,
    /// `--_trust`: trust the remote domain without prompting.
    pub trust: bool,
    /// `--_no-cache`: bypass the remote file cache.
    pub no_cache: bool,
    /// `--_interactive` / `-_i`: force the interactive transform.
    pub interactive: bool,
    /// `--_cwd <dir>`: working directory for inline commands.
    pub cwd: Option<PathBuf>,
}

/// Everything recovered from the passthrough vector.
#[derive(Debug, Clone, Default)]
pub struct ParsedArgs {
    /// Outer-tool flags.
    pub hijacked: HijackedFlags,
    /// Template variable bindings from `--_name` flags, keyed with the
    /// underscore prefix (`_name`).
    pub template_vars: Vec<(String, String)>,
    /// Non-underscore `--key [value]` overrides, merged over front matter.
    pub flag_overrides: ConfigMap,
    /// Bare positional arguments in order.
    pub positionals: Vec<String>,
}

/// Split a raw argument vector.
#[must_use]
pub fn parse_remaining(args: &[String]) -> ParsedArgs {
    let mut parsed = ParsedArgs::default();
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--_dry-run" => parsed.hijacked.dry_run = true,
            "--_trust" => parsed.hijacked.trust = true,
            "--_no-cache" => parsed.hijacked.no_cache = true,
            "--_interactive" | "-_i" => parsed.hijacked.interactive = true,
            "--_command" | "-_c" => {
                parsed.hijacked.command = iter.next().cloned();
            }
            "--_cwd" => {
                parsed.hijacked.cwd = iter.next().map(PathBuf::from);
            }
            _ => {
                if let Some(value) = arg.strip_prefix("--_command=") {
                    parsed.hijacked.command = Some(value.to_string());
                } else if let Some(value) = arg.strip_prefix("--_cwd=") {
                    parsed.hijacked.cwd = Some(PathBuf::from(value));
                } else if let Some(rest) = arg.strip_prefix("--_") {
                    let (name, value) = split_flag_value(rest, &mut iter);
                    parsed.template_vars.push((format!("_{name}"), value));
                } else if let Some(rest) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))
                {
                    if rest.is_empty() {
                        parsed.positionals.push(arg.clone());
                        continue;
                    }
                    let (name, value) = split_override_value(rest, &mut iter);
                    parsed.flag_overrides.insert(name, value);
                } else {
                    parsed.positionals.push(arg.clone());
                }
            }
        }
    }
    parsed
}

/// Split `name=value` or take the next non-flag token; bare flags bind
/// `"true"`.
fn split_flag_value<'a, I>(rest: &str, iter: &mut std::iter::Peekable<I>) -> (String, String)
where
    I: Iterator<Item = &'a String>,
{
    if let Some((name, value)) = rest.split_once('=') {
        return (name.to_string(), value.to_string());
    }
    let takes_value = iter.peek().is_some_and(|next| !next.starts_with('-'));
    if takes_value {
        let value = iter.next().cloned().unwrap_or_default();
        (rest.to_string(), value)
    } else {
        (rest.to_string(), "true".to_string())
    }
}

/// Like [`split_flag_value`] but producing a config value: valueless
/// flags become `true` booleans.
fn split_override_value<'a, I>(
    rest: &str,
    iter: &mut std::iter::Peekable<I>,
) -> (String, ConfigValue)
where
    I: Iterator<Item = &'a String>,
{
    if let Some((name, value)) = rest.split_once('=') {
        return (name.to_string(), ConfigValue::from(value));
    }
    let takes_value = iter.peek().is_some_and(|next| !next.starts_with('-'));
    if takes_value {
        let value = iter.next().cloned().unwrap_or_default();
        (rest.to_string(), ConfigValue::String(value))
    } else {
        (rest.to_string(), ConfigValue::Bool(true))
    }
}
