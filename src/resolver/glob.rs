//! Glob bundle expansion.
//!
//! `@./src/*.ts` imports every matching file as an XML-tagged bundle:
//!
//! ```text
//! <app path="src/app.ts">
//! ...content...
//! </app>
//! ```
//!
//! Matches are filtered through the surrounding project's `.gitignore`
//! chain, binary files are skipped, and the total size is held under the
//! model's context window unless the force-context flag is set.

use anyhow::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{ALWAYS_IGNORED, CONTEXT_WARN_RATIO, MAX_INPUT_SIZE};
use crate::core::MdflowError;
use crate::tokens;
use crate::utils::fs::is_binary_file;
use crate::utils::platform::expand_tilde;

/// Expand a glob pattern rooted at `base_dir` into an XML bundle.
///
/// Zero matches produce an empty string, not an error.
///
/// # Errors
///
/// - [`MdflowError::FileSizeLimit`] when any single match exceeds the cap
/// - [`MdflowError::ContextLimitExceeded`] when the bundle's token count
///   exceeds `context_limit` and force-context is off
pub async fn expand_glob(pattern: &str, base_dir: &Path, context_limit: usize) -> Result<String> {
    let expanded = expand_tilde(pattern)?;
    let full_pattern = if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    };

    let ignore_set = build_ignore_set(base_dir);

    let mut matches: Vec<PathBuf> = Vec::new();
    let paths = glob::glob(&full_pattern.to_string_lossy())
        .map_err(|e| MdflowError::ImportError { message: format!("invalid glob '{pattern}': {e}") })?;
    for entry in paths.flatten() {
        if !entry.is_file() {
            continue;
        }
        // Ignore rules only apply to files under the base directory;
        // absolute and tilde patterns escape the project's ignore chain.
        if entry.strip_prefix(base_dir).is_ok()
            && ignore_set.matched_path_or_any_parents(&entry, false).is_ignore()
        {
            debug!("Glob skipping ignored file {}", entry.display());
            continue;
        }
        if is_binary_file(&entry) {
            debug!("Glob skipping binary file {}", entry.display());
            continue;
        }
        let size = std::fs::metadata(&entry).map(|m| m.len()).unwrap_or(0);
        if size > MAX_INPUT_SIZE {
            return Err(MdflowError::FileSizeLimit {
                path: entry.display().to_string(),
                size,
                limit: MAX_INPUT_SIZE,
            }
            .into());
        }
        matches.push(entry);
    }

    matches.sort_by_key(|p| relative_display(p, base_dir));

    if matches.is_empty() {
        return Ok(String::new());
    }

    let mut contents: Vec<(PathBuf, String)> = Vec::with_capacity(matches.len());
    let mut concatenated = String::new();
    for path in matches {
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            MdflowError::ImportError {
                message: format!("failed to read {}: {e}", path.display()),
            }
        })?;
        concatenated.push_str(&text);
        contents.push((path, text));
    }

    let token_count = tokens::count_tokens(&concatenated);
    if token_count > context_limit && !tokens::force_context_enabled() {
        return Err(MdflowError::ContextLimitExceeded {
            pattern: pattern.to_string(),
            file_count: contents.len(),
            tokens: token_count,
            limit: context_limit,
        }
        .into());
    }
    if (token_count as f64) > (context_limit as f64) * CONTEXT_WARN_RATIO {
        warn!(
            "Glob '{}' bundles {} tokens, over half the {}-token context limit",
            pattern,
            tokens::format_token_count(token_count),
            tokens::format_token_count(context_limit),
        );
    }

    let blocks: Vec<String> = contents
        .iter()
        .map(|(path, text)| {
            let tag = tag_slug(path);
            let rel = relative_display(path, base_dir);
            format!("<{tag} path=\"{rel}\">\n{text}\n</{tag}>")
        })
        .collect();
    Ok(blocks.join("\n\n"))
}

/// Path relative to the base directory, for sorting and `path=` attributes.
fn relative_display(path: &Path, base_dir: &Path) -> String {
    path.strip_prefix(base_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Collect the ignore chain: every `.gitignore` from `base_dir` up to the
/// git root (the first ancestor containing `.git`), plus the built-in
/// seed patterns.
fn build_ignore_set(base_dir: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(base_dir);
    for pattern in ALWAYS_IGNORED {
        // Seed patterns are infallible literals.
        let _ = builder.add_line(None, pattern);
    }

    let mut dir = Some(base_dir);
    while let Some(current) = dir {
        let gitignore = current.join(".gitignore");
        if gitignore.is_file() {
            if let Some(err) = builder.add(&gitignore) {
                debug!("Ignoring unreadable {}: {err}", gitignore.display());
            }
        }
        if current.join(".git").exists() {
            break;
        }
        dir = current.parent();
    }

    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Derive the XML tag from a filename: extension removed, lowercased,
/// non-alphanumeric runs collapsed to `-`, a leading digit prefixed with
/// `_`, empty fallback `file`.
fn tag_slug(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut slug = String::with_capacity(stem.len());
    let mut last_dash = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();

    if slug.is_empty() {
        return "file".to_string();
    }
    if slug.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return format!("_{slug}");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_tag_slug() {
        assert_eq!(tag_slug(Path::new("src/App.ts")), "app");
        assert_eq!(tag_slug(Path::new("my file.v2.ts")), "my-file-v2");
        assert_eq!(tag_slug(Path::new("2fa.rs")), "_2fa");
        assert_eq!(tag_slug(Path::new("---.txt")), "file");
        assert_eq!(tag_slug(Path::new("read_me.md")), "read-me");
    }

    #[tokio::test]
    async fn test_expand_basic_bundle() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/b.ts", "let b = 2;");
        write(temp.path(), "src/a.ts", "let a = 1;");
        write(temp.path(), "src/skip.js", "let s = 0;");

        let out = expand_glob("./src/*.ts", temp.path(), 100_000).await.unwrap();
        // Sorted by relative path: a.ts before b.ts.
        let a_pos = out.find("src/a.ts").unwrap();
        let b_pos = out.find("src/b.ts").unwrap();
        assert!(a_pos < b_pos);
        assert!(out.contains("<a path=\"src/a.ts\">\nlet a = 1;\n</a>"));
        assert!(out.contains("<b path=\"src/b.ts\">\nlet b = 2;\n</b>"));
        assert!(!out.contains("skip.js"));
    }

    #[tokio::test]
    async fn test_zero_matches_is_empty() {
        let temp = TempDir::new().unwrap();
        let out = expand_glob("./nothing/*.xyz", temp.path(), 100_000).await.unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_gitignore_filtering() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        write(temp.path(), ".gitignore", "generated.ts\n");
        write(temp.path(), "src/kept.ts", "kept");
        write(temp.path(), "src/generated.ts", "generated");

        let out = expand_glob("./src/*.ts", temp.path(), 100_000).await.unwrap();
        assert!(out.contains("kept"));
        assert!(!out.contains("generated.ts"));
    }

    #[tokio::test]
    async fn test_binary_files_skipped_silently() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/text.ts", "text");
        std::fs::write(temp.path().join("src/blob.ts"), b"bin\x00ary").unwrap();

        let out = expand_glob("./src/*.ts", temp.path(), 100_000).await.unwrap();
        assert!(out.contains("text.ts"));
        assert!(!out.contains("blob.ts"));
    }

    #[tokio::test]
    async fn test_node_modules_always_ignored() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "node_modules/dep/index.ts", "dep");
        write(temp.path(), "src/own.ts", "own");

        let out = expand_glob("./**/*.ts", temp.path(), 100_000).await.unwrap();
        assert!(out.contains("own"));
        assert!(!out.contains("node_modules"));
    }

    #[tokio::test]
    async fn test_context_limit_exceeded() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/big.ts", &"word ".repeat(200));

        let err = expand_glob("./src/*.ts", temp.path(), 10).await.unwrap_err();
        match err.downcast_ref::<MdflowError>() {
            Some(MdflowError::ContextLimitExceeded { pattern, file_count, .. }) => {
                assert_eq!(pattern, "./src/*.ts");
                assert_eq!(*file_count, 1);
            }
            other => panic!("expected ContextLimitExceeded, got {other:?}"),
        }
    }
}
