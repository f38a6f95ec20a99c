//! Import resolution: the parse → resolve → inject pipeline.
//!
//! The directive parser produces an ordered list of spans; each directive
//! resolves concurrently (bounded by a semaphore) into a replacement
//! string; replacements are spliced back in descending index order so
//! earlier offsets stay valid. File imports recurse into the same
//! pipeline with the imported file's directory as the new base and its
//! canonical path pushed onto the import stack, which is how cycles are
//! caught.
//!
//! The final body is deterministic regardless of completion order.

pub mod command;
pub mod dashboard;
pub mod glob;
pub mod url;

use anyhow::Result;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::constants::RESOLVER_CONCURRENCY;
use crate::core::MdflowError;
use crate::markdown::{parse_directives, Directive, ParsedDirective};
use crate::utils::fs::{is_binary_file, read_text_capped};
use crate::utils::platform::{canonicalize, expand_tilde};

pub use command::ExecContext;
pub use dashboard::Dashboard;

/// Shared state for one top-level body expansion.
pub struct Resolver {
    semaphore: Arc<Semaphore>,
    exec: ExecContext,
    /// `_cwd` front-matter override for command working directories.
    invocation_cwd: Option<PathBuf>,
    client: reqwest::Client,
    context_limit: usize,
    /// Logical paths/URLs in completion order; dry-run introspection only.
    resolved: Arc<Mutex<Vec<String>>>,
}

impl Resolver {
    /// Build a resolver around a prepared execution context.
    #[must_use]
    pub fn new(exec: ExecContext, invocation_cwd: Option<PathBuf>, context_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(RESOLVER_CONCURRENCY)),
            exec,
            invocation_cwd,
            client: reqwest::Client::new(),
            context_limit,
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The logical imports resolved so far, in completion order.
    #[must_use]
    pub fn resolved_imports(&self) -> Vec<String> {
        self.resolved.lock().expect("tracker lock never poisoned").clone()
    }

    fn track(&self, logical: String) {
        self.resolved.lock().expect("tracker lock never poisoned").push(logical);
    }

    /// Execution context with the working directory for commands resolved
    /// against the file currently being expanded.
    fn exec_for(&self, base_dir: &Path) -> ExecContext {
        let mut exec = self.exec.clone();
        exec.cwd = self.invocation_cwd.clone().unwrap_or_else(|| base_dir.to_path_buf());
        exec
    }

    /// Expand every directive in `body`, treating relative paths as
    /// rooted at `base_dir`. `stack` holds the canonical paths currently
    /// being expanded, the current file last.
    pub fn expand<'a>(
        &'a self,
        body: String,
        base_dir: PathBuf,
        stack: Vec<PathBuf>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let directives = parse_directives(&body);
            if directives.is_empty() {
                return Ok(body);
            }

            debug!("Resolving {} directives under {}", directives.len(), base_dir.display());

            let resolutions = directives.into_iter().map(|directive| {
                let base_dir = base_dir.clone();
                let stack = stack.clone();
                async move {
                    if self.exec.cancel.is_cancelled() {
                        return Err(MdflowError::UserCancelled.into());
                    }
                    let replacement = self.resolve_one(&directive, &base_dir, &stack).await?;
                    Ok::<(ParsedDirective, String), anyhow::Error>((directive, replacement))
                }
            });
            let mut resolved = futures::future::try_join_all(resolutions).await?;

            // Splice back to front so earlier indices stay valid.
            resolved.sort_by(|a, b| b.0.index.cmp(&a.0.index));
            let mut output = body;
            for (directive, replacement) in resolved {
                let start = directive.index;
                let end = start + directive.original.len();
                output.replace_range(start..end, &replacement);
            }
            Ok(output)
        })
    }

    /// Resolve a single directive into its replacement string.
    async fn resolve_one(
        &self,
        directive: &ParsedDirective,
        base_dir: &Path,
        stack: &[PathBuf],
    ) -> Result<String> {
        match &directive.directive {
            Directive::File { path, line_range } => {
                self.resolve_file(path, *line_range, base_dir, stack).await
            }
            Directive::Glob { pattern } => {
                let _permit = self.semaphore.acquire().await?;
                let bundle = glob::expand_glob(pattern, base_dir, self.context_limit).await?;
                self.track(pattern.clone());
                Ok(bundle)
            }
            Directive::Symbol { path, name } => {
                let _permit = self.semaphore.acquire().await?;
                let file = self.locate(path, base_dir)?;
                let source = read_text_capped(&file).await?;
                let slice = crate::markdown::extract_symbol(&source, name, path)?;
                self.track(format!("{path}#{name}"));
                Ok(slice)
            }
            Directive::Url { url } => {
                let _permit = self.semaphore.acquire().await?;
                let text = url::fetch_url(&self.client, url).await?;
                self.track(url.clone());
                Ok(text)
            }
            Directive::Command { text } => {
                let _permit = self.semaphore.acquire().await?;
                command::run_inline_command(text, &self.exec_for(base_dir)).await
            }
            Directive::ExecFence { info_string, shebang, code } => {
                let _permit = self.semaphore.acquire().await?;
                command::run_exec_fence(info_string, shebang, code, &self.exec_for(base_dir)).await
            }
        }
    }

    /// Resolve a file import, recursing into its own directives.
    async fn resolve_file(
        &self,
        path: &str,
        line_range: Option<(usize, usize)>,
        base_dir: &Path,
        stack: &[PathBuf],
    ) -> Result<String> {
        let file = self.locate(path, base_dir)?;

        let canonical = canonicalize(&file).map_err(|_| {
            // A symlink that cannot canonicalize is a self-referential loop.
            if file.read_link().is_ok() {
                anyhow::Error::from(MdflowError::circular_import(stack, &file))
            } else {
                MdflowError::FileNotFound { path: path.to_string() }.into()
            }
        })?;

        if stack.contains(&canonical) {
            return Err(MdflowError::circular_import(stack, &canonical).into());
        }

        // The permit covers the read only; recursion below re-acquires for
        // its own leaves so nested imports cannot deadlock the semaphore.
        let content = {
            let _permit = self.semaphore.acquire().await?;
            if is_binary_file(&file) {
                return Err(MdflowError::BinaryFileImport { path: path.to_string() }.into());
            }
            read_text_capped(&file).await?
        };

        let content = match line_range {
            Some((start, end)) => slice_lines(&content, start, end),
            None => content,
        };

        self.track(path.to_string());

        let mut child_stack = stack.to_vec();
        child_stack.push(canonical);
        let parent = file.parent().map_or_else(|| base_dir.to_path_buf(), Path::to_path_buf);
        self.expand(content, parent, child_stack).await
    }

    /// Resolve a directive path against the base directory.
    fn locate(&self, path: &str, base_dir: &Path) -> Result<PathBuf> {
        let expanded = expand_tilde(path)?;
        let full = if expanded.is_absolute() { expanded } else { base_dir.join(expanded) };
        if full.exists() || full.read_link().is_ok() {
            Ok(full)
        } else {
            Err(MdflowError::FileNotFound { path: path.to_string() }.into())
        }
    }
}

/// Take an inclusive, 1-indexed line range from text, clamped to the
/// file's length.
fn slice_lines(text: &str, start: usize, end: usize) -> String {
    let start = start.max(1);
    text.lines()
        .skip(start - 1)
        .take(end.saturating_sub(start) + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CancelToken;
    use crate::template::TemplateEngine;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn test_resolver() -> Resolver {
        let (_handle, cancel) = CancelToken::new();
        let exec = ExecContext {
            cwd: std::env::temp_dir(),
            env: Vec::new(),
            vars: BTreeMap::new(),
            tool_name: "mdflow".to_string(),
            dry_run: false,
            engine: Arc::new(TemplateEngine::new().unwrap()),
            cancel,
            dashboard: Dashboard::new(),
        };
        Resolver::new(exec, None, 200_000)
    }

    async fn expand_at(resolver: &Resolver, body: &str, dir: &Path) -> Result<String> {
        resolver.expand(body.to_string(), dir.to_path_buf(), Vec::new()).await
    }

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_no_directives_passthrough() {
        let resolver = test_resolver();
        let out = expand_at(&resolver, "plain body", Path::new("/tmp")).await.unwrap();
        assert_eq!(out, "plain body");
    }

    #[tokio::test]
    async fn test_file_import_spliced() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "notes.md", "the notes");
        let resolver = test_resolver();
        let out = expand_at(&resolver, "Before @./notes.md after.", temp.path()).await.unwrap();
        assert_eq!(out, "Before the notes after.");
        assert_eq!(resolver.resolved_imports(), vec!["./notes.md"]);
    }

    #[tokio::test]
    async fn test_length_accounting() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.md", "AAAA");
        write(temp.path(), "b.md", "B");
        let body = "x @./a.md y @./b.md z";
        let resolver = test_resolver();
        let out = expand_at(&resolver, body, temp.path()).await.unwrap();
        assert_eq!(out, "x AAAA y B z");
        // final length = original + sum(replacement - original) per span
        let delta = (4 - "@./a.md".len() as i64) + (1 - "@./b.md".len() as i64);
        assert_eq!(out.len() as i64, body.len() as i64 + delta);
    }

    #[tokio::test]
    async fn test_nested_import() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "outer.md", "outer(@./inner/deep.md)");
        write(temp.path(), "inner/deep.md", "deep");
        let resolver = test_resolver();
        let out = expand_at(&resolver, "go @./outer.md end", temp.path()).await.unwrap();
        assert_eq!(out, "go outer(deep) end");
    }

    #[tokio::test]
    async fn test_relative_paths_resolve_from_importing_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "sub/importer.md", "got @./sibling.md");
        write(temp.path(), "sub/sibling.md", "sibling");
        let resolver = test_resolver();
        let out = expand_at(&resolver, "@./sub/importer.md", temp.path()).await.unwrap();
        assert_eq!(out, "got sibling");
    }

    #[tokio::test]
    async fn test_line_range_import() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "code.rs", "l1\nl2\nl3\nl4\nl5");
        let resolver = test_resolver();
        let out = expand_at(&resolver, "@./code.rs:2-4", temp.path()).await.unwrap();
        assert_eq!(out, "l2\nl3\nl4");
    }

    #[tokio::test]
    async fn test_cycle_detection() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.claude.md", "@./b.md");
        write(temp.path(), "b.md", "@./a.claude.md");
        let resolver = test_resolver();
        let a = canonicalize(&temp.path().join("a.claude.md")).unwrap();
        let err = resolver
            .expand("@./b.md".to_string(), temp.path().to_path_buf(), vec![a])
            .await
            .unwrap_err();
        match err.downcast_ref::<MdflowError>() {
            Some(MdflowError::CircularImport { chain }) => {
                assert!(chain.contains("a.claude.md"), "{chain}");
                assert!(chain.contains("b.md"), "{chain}");
                assert_eq!(chain.matches("a.claude.md").count(), 2, "{chain}");
            }
            other => panic!("expected CircularImport, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_self_symlink_is_circular() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("loop.md");
        std::os::unix::fs::symlink(&link, &link).unwrap();
        let resolver = test_resolver();
        let err = expand_at(&resolver, "@./loop.md", temp.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MdflowError>(),
            Some(MdflowError::CircularImport { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let resolver = test_resolver();
        let err = expand_at(&resolver, "@./absent.md", temp.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MdflowError>(),
            Some(MdflowError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_binary_import_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blob.md"), b"x\x00y").unwrap();
        let resolver = test_resolver();
        let err = expand_at(&resolver, "@./blob.md", temp.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MdflowError>(),
            Some(MdflowError::BinaryFileImport { .. })
        ));
    }

    #[tokio::test]
    async fn test_symbol_import() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.ts", "const a = 1;\nexport function hit() {\n  return 2;\n}\n");
        let resolver = test_resolver();
        let out = expand_at(&resolver, "@./app.ts#hit", temp.path()).await.unwrap();
        assert_eq!(out, "export function hit() {\n  return 2;\n}");
        assert_eq!(resolver.resolved_imports(), vec!["./app.ts#hit"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_and_import_combined() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "part.md", "imported");
        let resolver = test_resolver();
        let out = expand_at(&resolver, "A @./part.md B !`echo ran` C", temp.path()).await.unwrap();
        assert_eq!(out, "A imported B {% raw %}\nran\n{% endraw %} C");
    }

    #[tokio::test]
    async fn test_glob_zero_matches_empty_replacement() {
        let temp = TempDir::new().unwrap();
        let resolver = test_resolver();
        let out = expand_at(&resolver, "x @./none/*.zz y", temp.path()).await.unwrap();
        assert_eq!(out, "x  y");
    }

    #[test]
    fn test_slice_lines_clamps() {
        assert_eq!(slice_lines("a\nb\nc", 2, 99), "b\nc");
        assert_eq!(slice_lines("a\nb\nc", 1, 1), "a");
        assert_eq!(slice_lines("a\nb\nc", 9, 10), "");
    }
}
