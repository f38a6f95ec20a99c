//! Global constants used throughout the mdflow codebase.
//!
//! This module contains timeout durations, output caps, and other numeric
//! constants that are used across multiple modules. Defining them centrally
//! improves maintainability and makes magic numbers more discoverable.

use std::time::Duration;

/// Maximum runtime for an inline command or executable code fence (30 seconds).
///
/// Commands that exceed this are killed and the whole invocation fails
/// with a timeout error.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of characters retained from a command's output.
///
/// Output beyond this is truncated with an explanatory suffix so a noisy
/// command cannot blow up the prompt.
pub const MAX_COMMAND_OUTPUT: usize = 100_000;

/// Maximum size in bytes for any single input: an imported file, a glob
/// member, or collected stdin.
pub const MAX_INPUT_SIZE: u64 = 10 * 1024 * 1024;

/// Number of bytes sniffed when deciding whether a file is binary.
pub const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Number of leading output bytes checked for null bytes after a command
/// exits.
pub const COMMAND_BINARY_CHECK_LEN: usize = 1024;

/// Capacity of the resolver's concurrency semaphore.
///
/// At most this many directive resolutions (file reads, shells, fetches)
/// are in flight at once.
pub const RESOLVER_CONCURRENCY: usize = 10;

/// Fallback context window in tokens when neither the model table nor an
/// environment override applies.
pub const DEFAULT_CONTEXT_WINDOW: usize = 200_000;

/// Fraction of the context limit above which the glob expander warns.
pub const CONTEXT_WARN_RATIO: f64 = 0.5;

/// Refresh cadence of the TTY command dashboard.
pub const DASHBOARD_TICK: Duration = Duration::from_millis(80);

/// Number of trailing stdout characters shown per dashboard line.
pub const DASHBOARD_TAIL_CHARS: usize = 15;

/// Directory name (under both `$HOME` and the project) holding mdflow
/// state: config, project agents, logs, cache.
pub const MDFLOW_DIR: &str = ".mdflow";

/// Project config file names, in lookup order.
pub const PROJECT_CONFIG_NAMES: &[&str] = &["mdflow.config.yaml", ".mdflow.yaml", ".mdflow.json"];

/// File extensions treated as binary without sniffing file contents.
pub const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "pdf", "zip", "tar", "gz", "bz2",
    "xz", "zst", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "war", "bin",
    "dat", "db", "sqlite", "wasm", "mp3", "mp4", "avi", "mov", "mkv", "flac", "ogg", "wav", "woff",
    "woff2", "ttf", "otf", "eot",
];

/// Ignore patterns always seeded into the glob expander's ignore set,
/// regardless of any `.gitignore` contents.
pub const ALWAYS_IGNORED: &[&str] = &[".git", "node_modules", ".DS_Store", "*.log"];
