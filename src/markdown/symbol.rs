//! Best-effort extraction of a named declaration from source text.
//!
//! `@./src/app.ts#handleRequest` imports just one declaration instead of
//! the whole file. The extractor is deliberately not a parser: it finds
//! the declaration's first line by pattern, then tracks brace and paren
//! depth (string-literal aware) until the declaration plausibly ends.
//!
//! Known limitation: chained member access continued on a following line
//! can be over-included (the `.`-continuation heuristic is greedy). Cheap
//! static slicing is the goal, not language fidelity.

use anyhow::Result;
use regex::Regex;

use crate::core::MdflowError;

/// Declaration forms recognized, with optional `export`/`default`/
/// `abstract`/`async` prefixes:
///
/// `interface N {` · `type N =` · `function N(` · `class N {` ·
/// `const|let|var N =` · `enum N {`
fn declaration_regex(name: &str) -> Regex {
    let escaped = regex::escape(name);
    Regex::new(&format!(
        r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:async\s+)?(?:interface|class|enum|function|type|const|let|var)\s+{escaped}\b"
    ))
    .expect("declaration pattern is valid")
}

/// Character-level scan state carried across lines.
#[derive(Default)]
struct ScanState {
    brace: i64,
    paren: i64,
    /// Some(quote) while inside a string literal; backtick strings span lines.
    string: Option<char>,
}

impl ScanState {
    fn feed_line(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        while let Some(ch) = chars.next() {
            if let Some(quote) = self.string {
                if ch == '\\' {
                    chars.next();
                } else if ch == quote {
                    self.string = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' | '`' => self.string = Some(ch),
                '{' => self.brace += 1,
                '}' => self.brace -= 1,
                '(' => self.paren += 1,
                ')' => self.paren -= 1,
                _ => {}
            }
        }
        // Single- and double-quoted literals do not span lines.
        if matches!(self.string, Some('\'' | '"')) {
            self.string = None;
        }
    }

    fn balanced(&self) -> bool {
        self.brace <= 0 && self.paren <= 0 && self.string.is_none()
    }
}

/// Extract the declaration named `name` from `source`.
///
/// # Errors
///
/// [`MdflowError::SymbolNotFound`] when no line matches a declaration
/// pattern for the name. `path` is used only for the error message.
pub fn extract_symbol(source: &str, name: &str, path: &str) -> Result<String> {
    let pattern = declaration_regex(name);
    let lines: Vec<&str> = source.lines().collect();

    let start = lines
        .iter()
        .position(|line| pattern.is_match(line.trim_start()))
        .ok_or_else(|| MdflowError::SymbolNotFound {
            name: name.to_string(),
            path: path.to_string(),
        })?;

    let mut state = ScanState::default();
    for (i, line) in lines.iter().enumerate().skip(start) {
        state.feed_line(line);
        if !state.balanced() {
            continue;
        }
        let trimmed = line.trim_end();
        let terminated = trimmed.ends_with(';') || trimmed.ends_with('}');
        let next_continues = lines
            .get(i + 1)
            .is_some_and(|next| next.trim_start().starts_with('.'));
        if terminated || !next_continues {
            return Ok(lines[start..=i].join("\n"));
        }
    }

    // Never balanced out: return everything from the start line on.
    Ok(lines[start..].join("\n"))
}
