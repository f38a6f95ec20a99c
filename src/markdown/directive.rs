//! Context-aware directive scanning.
//!
//! The body of an agent file can embed directives: `@path` imports (files,
//! globs, symbol slices, line ranges), `@https://` URLs, `` !`command` ``
//! inline shells, and executable code fences. Directives written inside
//! code fences or inline code spans are documentation, not instructions,
//! and must never be executed.
//!
//! A single left-to-right pass classifies every byte of the body as
//! `normal`, `fenced_code`, or `inline_code`. Directives other than
//! [`Directive::ExecFence`] may only *begin* inside a `normal` range;
//! exec fences may only begin exactly where a top-level fence opened.
//!
//! This module is pure: no I/O, no environment access.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Canonical `@path` form: optional tilde, then `.` or `/`, then anything
/// up to whitespace.
static PATH_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(~?[./][^\s]+)").unwrap());

/// URL directives: http/https only.
static URL_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(https?://[^\s]+)").unwrap());

/// Symbol suffix: `#ident` at end of path.
static SYMBOL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)#([A-Za-z_$][A-Za-z0-9_$]*)$").unwrap());

/// Line-range suffix: `:start-end` at end of path.
static LINE_RANGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+):(\d+)-(\d+)$").unwrap());

/// Fence opening: up to three spaces, then >=3 backticks or tildes, then
/// the info string.
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").unwrap());

/// One directive kind with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Single file import, optionally a 1-indexed inclusive line range.
    File {
        /// Path as written (may start with `~`, `.`, or `/`)
        path: String,
        /// `start..=end`, 1-indexed, when the `:N-M` suffix was present
        line_range: Option<(usize, usize)>,
    },
    /// Glob bundle import.
    Glob {
        /// The glob pattern as written
        pattern: String,
    },
    /// Named-declaration slice out of a source file.
    Symbol {
        /// Path to the source file
        path: String,
        /// Declaration name after `#`
        name: String,
    },
    /// URL fetch.
    Url {
        /// Full http/https URL
        url: String,
    },
    /// Inline shell command.
    Command {
        /// The command text between the backtick fences
        text: String,
    },
    /// Executable fenced code block (first code line is a shebang).
    ExecFence {
        /// The fence's info string, as written
        info_string: String,
        /// The `#!...` first line
        shebang: String,
        /// Remaining lines of the block
        code: String,
    },
}

/// A directive with its location in the body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDirective {
    /// Byte offset into the (unexpanded) body where `original` begins.
    pub index: usize,
    /// The exact substring to be replaced by the resolved content.
    pub original: String,
    /// The parsed directive.
    pub directive: Directive,
}

/// A top-level fenced code block found by the scanner.
#[derive(Debug, Clone)]
struct FenceBlock {
    /// Byte offset of the fence-opening line's first byte.
    start: usize,
    /// Byte offset one past the closing line (or end of body).
    end: usize,
    /// Info string after the opening fence characters, trimmed.
    info_string: String,
    /// Byte offset of the first content line.
    content_start: usize,
    /// Byte offset one past the last content byte (before the close line).
    content_end: usize,
}

/// Result of the safe-range scan.
#[derive(Debug, Clone)]
struct ScanResult {
    /// Maximal byte ranges where context was `normal`.
    safe: Vec<Range<usize>>,
    /// Top-level fences, in document order.
    fences: Vec<FenceBlock>,
}

impl ScanResult {
    fn is_safe(&self, pos: usize) -> bool {
        self.safe.iter().any(|r| r.contains(&pos))
    }
}

/// Close the running safe range, if any, at `upto` (exclusive).
fn close_safe(safe_start: &mut Option<usize>, upto: usize, safe: &mut Vec<Range<usize>>) {
    if let Some(start) = safe_start.take() {
        if upto > start {
            safe.push(start..upto);
        }
    }
}

/// Classify the body into safe ranges and top-level fences.
fn scan(body: &str) -> ScanResult {
    let mut safe: Vec<Range<usize>> = Vec::new();
    let mut fences: Vec<FenceBlock> = Vec::new();

    // Current open fence: (kind char, length, block under construction).
    let mut open_fence: Option<(char, usize, FenceBlock)> = None;
    let mut safe_start: Option<usize> = None;

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let stripped = line.strip_suffix('\n').unwrap_or(line);

        if let Some((kind, len, ref mut block)) = open_fence {
            let closes = stripped.chars().take_while(|&c| c == kind).count() >= len
                && stripped.starts_with(kind);
            if closes {
                block.content_end = line_start;
                block.end = offset;
                fences.push(open_fence.take().unwrap().2);
            }
            continue;
        }

        if let Some(caps) = FENCE_OPEN.captures(stripped) {
            close_safe(&mut safe_start, line_start, &mut safe);
            let fence_chars = caps.get(1).unwrap().as_str();
            let kind = fence_chars.chars().next().unwrap();
            let block = FenceBlock {
                start: line_start,
                end: body.len(),
                info_string: caps.get(2).unwrap().as_str().trim().to_string(),
                content_start: offset,
                content_end: body.len(),
            };
            open_fence = Some((kind, fence_chars.len(), block));
            continue;
        }

        // Normal line: walk chars, toggling inline code on backticks.
        let mut in_inline = false;
        for (i, ch) in line.char_indices() {
            let pos = line_start + i;
            if ch == '`' {
                if in_inline {
                    in_inline = false;
                    // The closing backtick itself stays unsafe.
                    safe_start = Some(pos + ch.len_utf8());
                } else {
                    in_inline = true;
                    close_safe(&mut safe_start, pos, &mut safe);
                }
            } else if !in_inline && safe_start.is_none() {
                safe_start = Some(pos);
            }
        }
        // A newline in inline code forces a return to normal.
        if in_inline {
            safe_start = None;
        }
    }

    // Unterminated fence runs to end of body.
    if let Some((_, _, block)) = open_fence {
        fences.push(block);
    }
    close_safe(&mut safe_start, body.len(), &mut safe);

    ScanResult { safe, fences }
}

/// Strip sentence punctuation from the tail of a matched path or URL.
///
/// `See @./src/*.ts.` refers to `./src/*.ts`; the final period belongs to
/// the prose. Closing brackets are left alone because glob character
/// classes end with `]`.
fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(['.', ',', ';', ':', '!', '?'])
}

/// Classify an `@path` payload into its directive sub-form.
fn classify_path(path: &str) -> Directive {
    if path.contains(['*', '?', '[']) {
        return Directive::Glob { pattern: path.to_string() };
    }
    if let Some(caps) = SYMBOL_SUFFIX.captures(path) {
        return Directive::Symbol {
            path: caps.get(1).unwrap().as_str().to_string(),
            name: caps.get(2).unwrap().as_str().to_string(),
        };
    }
    if let Some(caps) = LINE_RANGE_SUFFIX.captures(path) {
        let start: usize = caps.get(2).unwrap().as_str().parse().unwrap_or(0);
        let end: usize = caps.get(3).unwrap().as_str().parse().unwrap_or(0);
        if start >= 1 && end >= start {
            return Directive::File {
                path: caps.get(1).unwrap().as_str().to_string(),
                line_range: Some((start, end)),
            };
        }
    }
    Directive::File { path: path.to_string(), line_range: None }
}

/// Find inline `` !`command` `` directives whose `!` sits at a safe position.
fn find_commands(body: &str, ranges: &ScanResult, out: &mut Vec<ParsedDirective>) {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'!' || !ranges.is_safe(i) {
            i += 1;
            continue;
        }
        let fence_start = i + 1;
        let fence_len = bytes[fence_start..].iter().take_while(|&&b| b == b'`').count();
        if fence_len == 0 {
            i += 1;
            continue;
        }
        let content_start = fence_start + fence_len;
        // The command ends at the next backtick run of at least fence_len
        // on the same line; a longer run contributes its leading extras to
        // the content and closes with its final fence_len ticks.
        let line_end = body[content_start..]
            .find('\n')
            .map_or(body.len(), |p| content_start + p);
        let mut close: Option<usize> = None;
        let mut j = content_start;
        while j < line_end {
            if bytes[j] == b'`' {
                let run = bytes[j..line_end].iter().take_while(|&&b| b == b'`').count();
                if run >= fence_len {
                    close = Some(j + run);
                    break;
                }
                j += run;
            } else {
                j += 1;
            }
        }
        let Some(end) = close else {
            i = line_end;
            continue;
        };
        out.push(ParsedDirective {
            index: i,
            original: body[i..end].to_string(),
            directive: Directive::Command {
                text: body[content_start..end - fence_len].to_string(),
            },
        });
        i = end;
    }
}

/// Parse all directives from a body, sorted ascending by index.
///
/// Guaranteed: `body[d.index..d.index + d.original.len()] == d.original`
/// for every returned directive, indices strictly ascend, and spans never
/// overlap.
#[must_use]
pub fn parse_directives(body: &str) -> Vec<ParsedDirective> {
    let ranges = scan(body);
    let mut out: Vec<ParsedDirective> = Vec::new();

    for caps in URL_DIRECTIVE.captures_iter(body) {
        let m = caps.get(0).unwrap();
        if !ranges.is_safe(m.start()) {
            continue;
        }
        let url = trim_trailing_punctuation(caps.get(1).unwrap().as_str());
        let original = &body[m.start()..m.start() + 1 + url.len()];
        out.push(ParsedDirective {
            index: m.start(),
            original: original.to_string(),
            directive: Directive::Url { url: url.to_string() },
        });
    }

    for caps in PATH_DIRECTIVE.captures_iter(body) {
        let m = caps.get(0).unwrap();
        if !ranges.is_safe(m.start()) {
            continue;
        }
        let path = trim_trailing_punctuation(caps.get(1).unwrap().as_str());
        if path.is_empty() {
            continue;
        }
        let original = &body[m.start()..m.start() + 1 + path.len()];
        out.push(ParsedDirective {
            index: m.start(),
            original: original.to_string(),
            directive: classify_path(path),
        });
    }

    find_commands(body, &ranges, &mut out);

    for fence in &ranges.fences {
        let content = &body[fence.content_start..fence.content_end];
        let first_line = content.lines().next().unwrap_or("");
        if !first_line.starts_with("#!") {
            continue;
        }
        let code = content
            .split_once('\n')
            .map_or(String::new(), |(_, rest)| rest.to_string());
        out.push(ParsedDirective {
            index: fence.start,
            original: body[fence.start..fence.end].to_string(),
            directive: Directive::ExecFence {
                info_string: fence.info_string.clone(),
                shebang: first_line.to_string(),
                code,
            },
        });
    }

    out.sort_by_key(|d| d.index);

    // Directive kinds are gated by disjoint contexts, so overlaps should be
    // impossible; keep the invariant airtight against pathological inputs
    // like an `@path` embedded in a matched URL.
    let mut result: Vec<ParsedDirective> = Vec::with_capacity(out.len());
    for d in out {
        let clear = result
            .last()
            .is_none_or(|prev| prev.index + prev.original.len() <= d.index);
        if clear {
            result.push(d);
        }
    }
    result
}

/// Cheap check used by the orchestrator to skip the resolver entirely.
#[must_use]
pub fn has_directives(body: &str) -> bool {
    !parse_directives(body).is_empty()
}
