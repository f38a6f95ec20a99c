//! Error handling for mdflow.
//!
//! This module provides the error types and user-facing error reporting for
//! the agent runner. The error system is built around two types:
//!
//! - [`MdflowError`] - Enumerated error kinds for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and
//!   actionable suggestions for CLI display
//!
//! Every error kind maps to a process exit code via
//! [`MdflowError::exit_code`]: configuration problems exit 2, user
//! cancellation exits 130, and anything that ran a driver propagates the
//! driver's own code through [`MdflowError::DriverExit`].
//!
//! Application code threads `anyhow::Result` through the call stack and
//! converts to an [`ErrorContext`] once, at the top of `main`, with
//! [`user_friendly_error`].

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for mdflow operations.
///
/// Each variant represents a specific failure mode with enough context to
/// produce an actionable message. Variants that originate inside the import
/// resolver abort the whole invocation; there is no partial expansion.
#[derive(Error, Debug)]
pub enum MdflowError {
    /// A requested file (agent file or import target) does not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that could not be located
        path: String,
    },

    /// A file exceeds the maximum input size.
    #[error("File too large: {path} ({size} bytes, limit {limit})")]
    FileSizeLimit {
        /// The offending file
        path: String,
        /// Actual size in bytes
        size: u64,
        /// The configured cap in bytes
        limit: u64,
    },

    /// A directly imported file was detected as binary.
    ///
    /// Glob imports skip binary files silently instead of failing.
    #[error("Cannot import binary file: {path}")]
    BinaryFileImport {
        /// The binary file
        path: String,
    },

    /// The symbol extractor could not locate the named declaration.
    #[error("Symbol '{name}' not found in {path}")]
    SymbolNotFound {
        /// The declaration name that was requested
        name: String,
        /// The source file that was searched
        path: String,
    },

    /// A file import cycle was detected.
    ///
    /// The chain names every file on the path back to the repeated entry,
    /// e.g. `a.claude.md -> b.md -> a.claude.md`.
    #[error("Circular import detected: {chain}")]
    CircularImport {
        /// Human-readable `->`-separated chain of the cycle
        chain: String,
    },

    /// A URL fetch failed at the transport layer or returned HTTP >= 400.
    #[error("Failed to fetch {url}: {reason}")]
    NetworkError {
        /// The URL being fetched
        url: String,
        /// Transport error or HTTP status description
        reason: String,
    },

    /// A URL returned content that is not text, markdown, or JSON.
    #[error("Unsupported content type '{content_type}' from {url}")]
    UnsupportedContentType {
        /// The rejected content type (or "unknown")
        content_type: String,
        /// The URL that produced it
        url: String,
    },

    /// An inline command or executable code fence failed.
    ///
    /// Covers non-zero exit, binary output, and timeouts.
    #[error("Command failed: {message}")]
    CommandFailed {
        /// Combined description: command text, exit code, stderr
        message: String,
    },

    /// An executable code fence exited non-zero.
    #[error("Code fence failed with exit code {code}: {stderr}")]
    CodeFenceFailed {
        /// The fence script's exit code
        code: i32,
        /// Captured stderr from the script
        stderr: String,
    },

    /// A template could not be parsed, or a required variable is missing
    /// in non-interactive mode.
    #[error("Template error: {message}")]
    TemplateError {
        /// Description of the parse failure or missing variables
        message: String,
    },

    /// Required template variables were left unbound with no terminal to
    /// prompt on.
    #[error("Missing template variables: {names}")]
    MissingTemplateVariables {
        /// Comma-separated variable names still unbound
        names: String,
    },

    /// A resolver-phase failure that fits no more specific kind.
    #[error("Import error: {message}")]
    ImportError {
        /// Description of the failure
        message: String,
    },

    /// Missing file argument, unknown command, or malformed CLI input.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem
        message: String,
    },

    /// Front matter could not be parsed as YAML.
    #[error("Invalid front matter in {path}: {reason}")]
    FrontMatterParseError {
        /// The agent file with the malformed front matter
        path: String,
        /// The YAML parser's message, including line/column
        reason: String,
    },

    /// An untrusted remote domain in non-interactive mode without `--_trust`.
    #[error("Untrusted remote domain: {domain}")]
    SecurityError {
        /// The domain that is not in the trust store
        domain: String,
    },

    /// The user declined a prompt (trust confirmation or variable fill).
    #[error("Cancelled by user")]
    UserCancelled,

    /// A glob bundle exceeds the resolved context limit.
    #[error(
        "Glob '{pattern}' matched {file_count} files totalling ~{tokens} tokens, \
         over the {limit}-token context limit"
    )]
    ContextLimitExceeded {
        /// The glob pattern
        pattern: String,
        /// Number of files bundled
        file_count: usize,
        /// Approximate token count of the bundle
        tokens: usize,
        /// The resolved context limit
        limit: usize,
    },

    /// The driver binary could not be found on PATH.
    #[error("Driver '{name}' not found on PATH")]
    DriverNotFound {
        /// The driver name that failed lookup
        name: String,
    },

    /// The driver ran and exited non-zero; its code is relayed as ours.
    #[error("Driver exited with code {code}")]
    DriverExit {
        /// The driver's exit code
        code: i32,
    },

    /// Internal non-error control flow: help text, dry run, and other
    /// early exits that should terminate with code 0.
    #[error("early exit")]
    EarlyExitRequest,

    /// The invocation was cancelled by a signal.
    #[error("Interrupted by signal {signal}")]
    Interrupted {
        /// Signal name, `SIGINT` or `SIGTERM`
        signal: &'static str,
    },

    /// I/O error wrapper for std errors that carry no mdflow context.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MdflowError {
    /// Map this error to the process exit code mandated for it.
    ///
    /// | Kind | Code |
    /// |------|------|
    /// | `EarlyExitRequest` | 0 |
    /// | `ConfigurationError`, `FrontMatterParseError` | 2 |
    /// | `UserCancelled` | 130 |
    /// | `Interrupted(SIGINT)` | 130 |
    /// | `Interrupted(SIGTERM)` | 143 |
    /// | `DriverNotFound` | 127 |
    /// | `DriverExit { code }` | `code` |
    /// | everything else | 1 |
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EarlyExitRequest => 0,
            Self::ConfigurationError { .. } | Self::FrontMatterParseError { .. } => 2,
            Self::UserCancelled => 130,
            Self::Interrupted { signal } => {
                if *signal == "SIGTERM" {
                    143
                } else {
                    130
                }
            }
            Self::DriverNotFound { .. } => 127,
            Self::DriverExit { code } => *code,
            _ => 1,
        }
    }

    /// Helper for building a `CircularImport` from the chain of canonical
    /// paths plus the repeated entry.
    #[must_use]
    pub fn circular_import(stack: &[PathBuf], repeated: &PathBuf) -> Self {
        let chain = stack
            .iter()
            .chain(std::iter::once(repeated))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        Self::CircularImport { chain }
    }
}

/// Wrapper that pairs an error with display-oriented context.
///
/// Used once at the top level to turn an `anyhow::Error` chain into a
/// single human-readable report with optional suggestion and details.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error message
    pub message: String,
    /// One-line actionable suggestion, if any
    pub suggestion: Option<String>,
    /// Longer explanation or log-file pointer, if any
    pub details: Option<String>,
    /// Exit code to terminate with
    pub exit_code: i32,
}

impl ErrorContext {
    /// Create a context from a message and exit code.
    #[must_use]
    pub fn new(message: impl Into<String>, exit_code: i32) -> Self {
        Self { message: message.into(), suggestion: None, details: None, exit_code }
    }

    /// Attach a one-line suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach extra details (log path, chain, etc.).
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the report to stderr with color when attached to a terminal.
    pub fn display(&self) {
        eprintln!("{} {}", "Agent failed:".red().bold(), self.message);
        if let Some(suggestion) = &self.suggestion {
            eprintln!("  {} {}", "hint:".yellow(), suggestion);
        }
        if let Some(details) = &self.details {
            eprintln!("  {details}");
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent failed: {}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  hint: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error chain into a user-friendly [`ErrorContext`].
///
/// Downcasts to [`MdflowError`] when possible so the exit code and
/// suggestion match the error kind; unknown errors exit 1.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    match error.downcast_ref::<MdflowError>() {
        Some(e) => {
            let ctx = ErrorContext::new(e.to_string(), e.exit_code());
            match e {
                MdflowError::FileNotFound { .. } => ctx.with_suggestion(
                    "check the path, or place the agent file under .mdflow/ to make it discoverable",
                ),
                MdflowError::CircularImport { .. } => {
                    ctx.with_suggestion("break the cycle by removing one of the @imports")
                }
                MdflowError::DriverNotFound { name } => ctx
                    .with_suggestion(format!("install '{name}' or pass --_command to pick another driver")),
                MdflowError::MissingTemplateVariables { names } => ctx.with_suggestion(format!(
                    "pass the variables on the command line, e.g. --_{} <value>",
                    names.split(',').next().unwrap_or("name").trim().trim_start_matches('_')
                )),
                MdflowError::SecurityError { .. } => {
                    ctx.with_suggestion("re-run with --_trust to trust this domain")
                }
                MdflowError::ContextLimitExceeded { .. } => ctx.with_suggestion(
                    "narrow the glob, raise context_window in front matter, or set MDFLOW_FORCE_CONTEXT=1",
                ),
                _ => ctx,
            }
        }
        None => ErrorContext::new(format!("{error:#}"), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MdflowError::EarlyExitRequest.exit_code(), 0);
        assert_eq!(
            MdflowError::ConfigurationError { message: "no file".into() }.exit_code(),
            2
        );
        assert_eq!(MdflowError::UserCancelled.exit_code(), 130);
        assert_eq!(MdflowError::Interrupted { signal: "SIGINT" }.exit_code(), 130);
        assert_eq!(MdflowError::Interrupted { signal: "SIGTERM" }.exit_code(), 143);
        assert_eq!(MdflowError::DriverNotFound { name: "claude".into() }.exit_code(), 127);
        assert_eq!(MdflowError::DriverExit { code: 42 }.exit_code(), 42);
        assert_eq!(
            MdflowError::CommandFailed { message: "boom".into() }.exit_code(),
            1
        );
    }

    #[test]
    fn test_circular_import_chain() {
        let stack = vec![PathBuf::from("a.claude.md"), PathBuf::from("b.md")];
        let err = MdflowError::circular_import(&stack, &PathBuf::from("a.claude.md"));
        assert_eq!(
            err.to_string(),
            "Circular import detected: a.claude.md -> b.md -> a.claude.md"
        );
    }

    #[test]
    fn test_user_friendly_error_downcast() {
        let err = anyhow::Error::from(MdflowError::DriverNotFound { name: "codex".into() });
        let ctx = user_friendly_error(err);
        assert_eq!(ctx.exit_code, 127);
        assert!(ctx.suggestion.unwrap().contains("codex"));
    }

    #[test]
    fn test_user_friendly_error_opaque() {
        let ctx = user_friendly_error(anyhow::anyhow!("something odd"));
        assert_eq!(ctx.exit_code, 1);
        assert!(ctx.message.contains("something odd"));
    }
}
