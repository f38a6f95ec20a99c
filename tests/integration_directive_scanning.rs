//! Directive-scanner invariants exercised over whole documents: span
//! fidelity, ordering, context gating, and boundary behaviors.

use mdflow::markdown::{parse_directives, Directive};

/// Every parsed directive must reproduce its exact source span, ascend
/// strictly by index, and never overlap its neighbors.
fn assert_invariants(body: &str) {
    let parsed = parse_directives(body);
    for d in &parsed {
        assert_eq!(
            &body[d.index..d.index + d.original.len()],
            d.original,
            "span mismatch at {}",
            d.index
        );
        assert!(d.index + d.original.len() <= body.len());
    }
    for pair in parsed.windows(2) {
        assert!(
            pair[0].index + pair[0].original.len() <= pair[1].index,
            "overlap between {} and {}",
            pair[0].index,
            pair[1].index
        );
    }
}

#[test]
fn mixed_document_holds_invariants() {
    let body = "\
Intro with @./a.md and a url @https://example.com/x.md here.

Run !`git log --oneline -3` for context.

```rust
// not a directive: @./hidden.md
fn main() {}
```

~~~sh
#!/bin/sh
echo from-fence
~~~

Inline `@./also-hidden.md` stays put, @~/real.md does not.
";
    assert_invariants(body);
    let kinds: Vec<&'static str> = parse_directives(body)
        .iter()
        .map(|d| match d.directive {
            Directive::File { .. } => "file",
            Directive::Glob { .. } => "glob",
            Directive::Symbol { .. } => "symbol",
            Directive::Url { .. } => "url",
            Directive::Command { .. } => "command",
            Directive::ExecFence { .. } => "fence",
        })
        .collect();
    assert_eq!(kinds, vec!["file", "url", "command", "fence", "file"]);
}

#[test]
fn empty_and_directive_free_bodies() {
    assert!(parse_directives("").is_empty());
    assert!(parse_directives("Nothing to see here.\n\nJust prose.").is_empty());
    assert_invariants("no directives at all");
}

#[test]
fn body_of_exactly_one_fence_yields_nothing() {
    let body = "```md\n@./x.md\n```\n";
    assert!(parse_directives(body).is_empty());
}

#[test]
fn fence_with_shebang_is_the_only_exception_inside_fences() {
    let body = "```sh\n#!/bin/sh\n@./never-imported.md\necho hi\n```\n";
    let parsed = parse_directives(body);
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].index, 0);
    match &parsed[0].directive {
        Directive::ExecFence { shebang, code, .. } => {
            assert_eq!(shebang, "#!/bin/sh");
            assert!(code.contains("@./never-imported.md"));
        }
        other => panic!("expected ExecFence, got {other:?}"),
    }
}

#[test]
fn all_path_sub_forms_classify() {
    let body = "@./plain.md @./src/**/*.rs @./app.ts#Config @./lib.rs:5-10 @/abs/file.txt @~/home.md";
    assert_invariants(body);
    let parsed = parse_directives(body);
    assert_eq!(parsed.len(), 6);
    assert!(matches!(&parsed[0].directive, Directive::File { path, line_range: None } if path == "./plain.md"));
    assert!(matches!(&parsed[1].directive, Directive::Glob { pattern } if pattern == "./src/**/*.rs"));
    assert!(
        matches!(&parsed[2].directive, Directive::Symbol { path, name } if path == "./app.ts" && name == "Config")
    );
    assert!(
        matches!(&parsed[3].directive, Directive::File { path, line_range: Some((5, 10)) } if path == "./lib.rs")
    );
    assert!(matches!(&parsed[4].directive, Directive::File { path, .. } if path == "/abs/file.txt"));
    assert!(matches!(&parsed[5].directive, Directive::File { path, .. } if path == "~/home.md"));
}

#[test]
fn sentence_punctuation_does_not_join_the_path() {
    let parsed = parse_directives("Compare @./a.md, @./b.md; then @./c.md!");
    let paths: Vec<String> = parsed
        .iter()
        .map(|d| match &d.directive {
            Directive::File { path, .. } => path.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(paths, vec!["./a.md", "./b.md", "./c.md"]);
}

#[test]
fn http_and_https_only() {
    let parsed = parse_directives("@https://a.test/x @http://b.test/y");
    assert_eq!(parsed.len(), 2);
    assert!(parsed.iter().all(|d| matches!(d.directive, Directive::Url { .. })));
    // Other schemes are not URL directives, and `ftp://...` is not a path.
    assert!(parse_directives("@ftp://c.test/z").is_empty());
}

#[test]
fn command_fences_scale_with_backticks() {
    let parsed = parse_directives("one !`pwd` two !``grep `x` file`` three");
    assert_eq!(parsed.len(), 2);
    assert!(matches!(&parsed[0].directive, Directive::Command { text } if text == "pwd"));
    assert!(matches!(&parsed[1].directive, Directive::Command { text } if text == "grep `x` file"));
}

#[test]
fn unclosed_command_fence_is_not_a_directive() {
    assert!(parse_directives("broken !`no close here").is_empty());
    // The next line is unaffected.
    let parsed = parse_directives("broken !`no close\n!`ls`");
    assert_eq!(parsed.len(), 1);
    assert!(matches!(&parsed[0].directive, Directive::Command { text } if text == "ls"));
}

#[test]
fn indented_fence_opens_but_four_spaces_do_not() {
    let body = "   ```sh\n#!/bin/sh\necho ok\n```\n";
    assert_eq!(parse_directives(body).len(), 1);

    // Four spaces is an indented code block in markdown, not a fence; the
    // scanner treats the line as normal text.
    let body = "    ```sh\n@./visible.md\n";
    let parsed = parse_directives(body);
    assert_eq!(parsed.len(), 1);
    assert!(matches!(&parsed[0].directive, Directive::File { path, .. } if path == "./visible.md"));
}

#[test]
fn fence_info_string_is_tokenized() {
    let body = "```ts title=demo runnable\n#!/usr/bin/env bun\nmain()\n```\n";
    let parsed = parse_directives(body);
    assert_eq!(parsed.len(), 1);
    match &parsed[0].directive {
        Directive::ExecFence { info_string, .. } => {
            assert_eq!(info_string, "ts title=demo runnable");
        }
        other => panic!("expected ExecFence, got {other:?}"),
    }
}

#[test]
fn crlf_documents_scan() {
    let body = "See @./a.md.\r\n```md\r\n@./hidden.md\r\n```\r\n";
    let parsed = parse_directives(body);
    assert_eq!(parsed.len(), 1);
    assert!(matches!(&parsed[0].directive, Directive::File { path, .. } if path == "./a.md"));
}

#[test]
fn adjacent_directives_do_not_merge() {
    let parsed = parse_directives("@./a.md @./b.md");
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].original, "@./a.md");
    assert_eq!(parsed[1].original, "@./b.md");
}
