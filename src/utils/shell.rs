//! Shell quoting for display purposes.
//!
//! Used by the dry-run plan and by error messages that echo a command
//! line back to the user. This is display-only; actual commands run via
//! the platform shell with the raw string.

/// Quote a single argument for POSIX-shell display.
///
/// Arguments containing no special characters pass through unchanged;
/// everything else is wrapped in single quotes with embedded single quotes
/// escaped as `'\''`.
#[must_use]
pub fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@'))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Render an argv as a copy-pasteable command line.
#[must_use]
pub fn format_argv(argv: &[String]) -> String {
    argv.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("claude"), "claude");
        assert_eq!(quote("--print"), "--print");
        assert_eq!(quote("a/b.md"), "a/b.md");
    }

    #[test]
    fn test_quote_spaces() {
        assert_eq!(quote("Say hi."), "'Say hi.'");
    }

    #[test]
    fn test_quote_embedded_single_quote() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_format_argv() {
        let argv = vec!["claude".to_string(), "--print".to_string(), "Say hi.".to_string()];
        assert_eq!(format_argv(&argv), "claude --print 'Say hi.'");
    }
}
