//! Free-variable analysis for Liquid templates.
//!
//! The engine itself does not expose its AST, so analysis is a token scan:
//! collect every root identifier referenced from `{{ ... }}` outputs and
//! `{% ... %}` tag expressions, subtract names bound inside the template
//! (`assign`, `capture`, `for`, `increment`, `decrement`), and subtract
//! the language's keywords and literals. `{% raw %}` and `{% comment %}`
//! regions are excluded up front.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static RAW_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{%-?\s*raw\s*-?%\}.*?\{%-?\s*endraw\s*-?%\}").unwrap());

static COMMENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%-?\s*comment\s*-?%\}.*?\{%-?\s*endcomment\s*-?%\}").unwrap()
});

static OUTPUT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{%-?(.*?)-?%\}").unwrap());

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).unwrap());

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Words that look like identifiers but are operators, literals, or loop
/// machinery, never free variables.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "contains", "in", "with", "as", "true", "false", "nil", "null", "empty",
    "blank", "limit", "offset", "reversed", "forloop", "else",
];

/// Tags whose first argument is a binding, not a reference.
const BINDING_TAGS: &[&str] = &["assign", "capture", "increment", "decrement"];

/// Return the set of root variable names a template references that it
/// does not itself bind.
///
/// `{{ a.b.c }}` contributes `a`; `{% for x in xs %}` binds `x` and
/// references `xs`; filter names are skipped but their arguments are
/// scanned (`{{ v | default: fallback }}` references `fallback`).
#[must_use]
pub fn free_variables(template: &str) -> BTreeSet<String> {
    let stripped = COMMENT_BLOCK.replace_all(template, "");
    let stripped = RAW_BLOCK.replace_all(&stripped, "");

    let mut referenced: BTreeSet<String> = BTreeSet::new();
    let mut bound: BTreeSet<String> = BTreeSet::new();

    for caps in OUTPUT.captures_iter(&stripped) {
        collect_expression(caps.get(1).unwrap().as_str(), &mut referenced);
    }

    for caps in TAG.captures_iter(&stripped) {
        let content = caps.get(1).unwrap().as_str().trim();
        let mut words = content.split_whitespace();
        let Some(tag) = words.next() else { continue };

        if BINDING_TAGS.contains(&tag) {
            if let Some(target) = words.next() {
                bound.insert(target.trim_end_matches('=').to_string());
            }
            // `assign x = expr` still references whatever expr names.
            if tag == "assign" {
                if let Some(rhs) = content.split_once('=').map(|(_, rhs)| rhs) {
                    collect_expression(rhs, &mut referenced);
                }
            }
            continue;
        }

        if tag == "for" {
            // for <x> in <xs> [limit: n] ...
            if let Some(target) = words.next() {
                bound.insert(target.to_string());
            }
            let rest: Vec<&str> = words.collect();
            if let Some(pos) = rest.iter().position(|w| *w == "in") {
                collect_expression(&rest[pos + 1..].join(" "), &mut referenced);
            }
            continue;
        }

        if matches!(tag, "if" | "elsif" | "unless" | "case" | "when" | "cycle" | "echo") {
            collect_expression(content.trim_start_matches(tag), &mut referenced);
        }
    }

    referenced.retain(|name| !bound.contains(name));
    referenced
}

/// Collect root identifiers from one expression, skipping filter names,
/// string literals, and keywords.
fn collect_expression(expr: &str, out: &mut BTreeSet<String>) {
    for (i, segment) in expr.split('|').enumerate() {
        // After the first `|`, each segment starts with a filter name
        // (optionally followed by `: args`); only the args hold variables.
        let scannable = if i == 0 {
            segment
        } else {
            match segment.split_once(':') {
                Some((_filter, args)) => args,
                None => continue,
            }
        };
        let no_strings = STRING_LITERAL.replace_all(scannable, " ");
        for m in IDENTIFIER.find_iter(&no_strings) {
            // Only root names: skip `.b` in `a.b` by checking the byte
            // before the match.
            if m.start() > 0 {
                let prev = no_strings.as_bytes()[m.start() - 1];
                if prev == b'.' {
                    continue;
                }
            }
            let name = m.as_str();
            if KEYWORDS.contains(&name) {
                continue;
            }
            out.insert(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free(t: &str) -> Vec<String> {
        free_variables(t).into_iter().collect()
    }

    #[test]
    fn test_simple_output() {
        assert_eq!(free("Hello {{ _name }}!"), vec!["_name"]);
    }

    #[test]
    fn test_property_access_yields_root() {
        assert_eq!(free("{{ user.address.city }}"), vec!["user"]);
    }

    #[test]
    fn test_filters_skipped_args_scanned() {
        assert_eq!(free("{{ _a | upcase }}"), vec!["_a"]);
        assert_eq!(free("{{ _a | default: _b }}"), vec!["_a", "_b"]);
        assert_eq!(free(r#"{{ _a | truncate: 10, "..." }}"#), vec!["_a"]);
    }

    #[test]
    fn test_assign_binds() {
        assert_eq!(free("{% assign x = _src %}{{ x }}"), vec!["_src"]);
    }

    #[test]
    fn test_capture_binds() {
        assert_eq!(free("{% capture greeting %}hi{% endcapture %}{{ greeting }}"), Vec::<String>::new());
    }

    #[test]
    fn test_for_binds_loop_var() {
        assert_eq!(free("{% for item in _items %}{{ item }}{% endfor %}"), vec!["_items"]);
    }

    #[test]
    fn test_increment_binds() {
        assert_eq!(free("{% increment counter %}{{ counter }}"), Vec::<String>::new());
    }

    #[test]
    fn test_keywords_and_literals_excluded() {
        assert_eq!(
            free(r#"{% if _x and _y or true %}{% endif %}{% unless _z contains "txt" %}{% endunless %}"#),
            vec!["_x", "_y", "_z"]
        );
        assert_eq!(free("{% if _n > 3 %}big{% endif %}"), vec!["_n"]);
    }

    #[test]
    fn test_raw_block_excluded() {
        assert_eq!(free("{% raw %}{{ not_a_var }}{% endraw %}{{ _real }}"), vec!["_real"]);
    }

    #[test]
    fn test_comment_block_excluded() {
        assert_eq!(free("{% comment %}{{ hidden }}{% endcomment %}"), Vec::<String>::new());
    }

    #[test]
    fn test_case_when() {
        assert_eq!(
            free("{% case _mode %}{% when 'fast' %}f{% when _alt %}a{% endcase %}"),
            vec!["_alt", "_mode"]
        );
    }

    #[test]
    fn test_forloop_object_not_free() {
        assert_eq!(
            free("{% for i in _xs %}{{ forloop.index }}{% endfor %}"),
            vec!["_xs"]
        );
    }
}
