//! Token counting and context-limit resolution.
//!
//! Glob bundles are rejected when their approximate token count exceeds the
//! context window of the model the agent targets. Counting uses the cl100k
//! BPE encoding, which is close enough for Claude- and GPT-family models;
//! the limit comes from a small model table with environment overrides.
//!
//! # Resolution order
//!
//! 1. `context_window` front-matter key (per-file override)
//! 2. `MDFLOW_CONTEXT_WINDOW` / `MA_CONTEXT_WINDOW` environment variable
//! 3. Model table lookup via `MDFLOW_MODEL` / `MA_MODEL` or the front
//!    matter's `model` key
//! 4. [`DEFAULT_CONTEXT_WINDOW`](crate::constants::DEFAULT_CONTEXT_WINDOW)

use crate::constants::DEFAULT_CONTEXT_WINDOW;

/// Approximate the token count of `text` under the cl100k encoding.
///
/// The bpe-openai crate keeps the encoder in a process-wide static, so
/// repeated calls pay only the O(n) walk over the text. Counts are
/// estimates: the downstream model may tokenize slightly differently.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    bpe_openai::cl100k_base().count(text)
}

/// Render a token count compactly for messages and the dry-run plan.
///
/// # Examples
///
/// ```rust
/// use mdflow::tokens::format_token_count;
///
/// assert_eq!(format_token_count(640), "640");
/// assert_eq!(format_token_count(2_300), "2.3k");
/// assert_eq!(format_token_count(2_000_000), "2.0M");
/// ```
#[must_use]
pub fn format_token_count(count: usize) -> String {
    match count {
        0..=999 => count.to_string(),
        1_000..=999_999 => format!("{:.1}k", count as f64 / 1e3),
        _ => format!("{:.1}M", count as f64 / 1e6),
    }
}

/// Context windows for model name prefixes, longest prefix wins.
const MODEL_CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("claude-3-5", 200_000),
    ("claude-3", 200_000),
    ("claude-opus", 200_000),
    ("claude-sonnet", 1_000_000),
    ("claude-haiku", 200_000),
    ("claude", 200_000),
    ("gemini-1.5-pro", 2_000_000),
    ("gemini-1.5", 1_000_000),
    ("gemini-2", 1_000_000),
    ("gemini", 1_000_000),
    ("gpt-5", 400_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 1_000_000),
    ("gpt-4", 128_000),
    ("o3", 200_000),
    ("o4", 200_000),
];

/// Look up the context window for a model name.
///
/// Matching is by prefix so dated snapshots (`claude-3-5-sonnet-20241022`)
/// resolve the same as their family name.
#[must_use]
pub fn model_context_window(model: &str) -> Option<usize> {
    let model = model.to_ascii_lowercase();
    MODEL_CONTEXT_WINDOWS
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, window)| *window)
}

/// Resolve the effective context limit in tokens.
///
/// `file_override` is the `context_window` front-matter key; `model` is
/// whatever model name is known for the run (front matter or environment).
#[must_use]
pub fn resolve_context_limit(file_override: Option<usize>, model: Option<&str>) -> usize {
    if let Some(limit) = file_override {
        return limit;
    }
    for var in ["MDFLOW_CONTEXT_WINDOW", "MA_CONTEXT_WINDOW"] {
        if let Ok(value) = std::env::var(var) {
            if let Ok(limit) = value.trim().parse::<usize>() {
                return limit;
            }
        }
    }
    let env_model = std::env::var("MDFLOW_MODEL")
        .or_else(|_| std::env::var("MA_MODEL"))
        .ok();
    let model = env_model.as_deref().or(model);
    model
        .and_then(model_context_window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Whether the force-context flag disables the glob token ceiling.
#[must_use]
pub fn force_context_enabled() -> bool {
    ["MDFLOW_FORCE_CONTEXT", "MA_FORCE_CONTEXT"]
        .iter()
        .any(|var| std::env::var(var).is_ok_and(|v| !v.is_empty() && v != "0" && v != "false"))
}
