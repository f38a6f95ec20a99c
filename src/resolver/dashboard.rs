//! Live progress for concurrently running commands and code fences.
//!
//! When stderr is a terminal, each running inline command or executable
//! fence gets a spinner line showing a truncated command preview and the
//! tail of its stdout so far. Off-terminal the whole surface is inert.
//!
//! Presentation only: the dashboard never affects directive ordering,
//! output capture, or exit codes.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;

use crate::constants::{DASHBOARD_TAIL_CHARS, DASHBOARD_TICK};

/// Maximum characters of the command preview shown per line.
const PREVIEW_CHARS: usize = 40;

/// Shared dashboard surface; clone freely across resolver tasks.
#[derive(Clone)]
pub struct Dashboard {
    multi: Arc<MultiProgress>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    /// Create a dashboard drawing to stderr. indicatif suppresses all
    /// drawing when stderr is not a terminal.
    #[must_use]
    pub fn new() -> Self {
        Self { multi: Arc::new(MultiProgress::new()) }
    }

    /// Register a newly started command; returns its live line.
    #[must_use]
    pub fn register(&self, command: &str) -> TaskLine {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .expect("static template is valid"),
        );
        bar.enable_steady_tick(DASHBOARD_TICK);
        let preview = truncate_preview(command);
        bar.set_message(preview.clone());
        TaskLine { bar, preview, tail: String::new() }
    }

    /// Print a line above the live bars without tearing them.
    pub fn println(&self, line: &str) {
        let _ = self.multi.println(line);
    }
}

/// One live directive's dashboard line.
pub struct TaskLine {
    bar: ProgressBar,
    preview: String,
    tail: String,
}

impl TaskLine {
    /// Feed a chunk of the command's stdout; the line shows the last few
    /// characters.
    pub fn update(&mut self, chunk: &str) {
        let cleaned: String = chunk.chars().filter(|c| !c.is_control()).collect();
        self.tail.push_str(&cleaned);
        // Only the tail is ever shown; keep the buffer bounded.
        let count = self.tail.chars().count();
        if count > DASHBOARD_TAIL_CHARS {
            self.tail = self.tail.chars().skip(count - DASHBOARD_TAIL_CHARS).collect();
        }
        self.bar.set_message(format!("{} {}", self.preview, self.tail));
    }

    /// Remove the line; finished directives disappear from the list.
    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

/// Truncate a command for the one-line preview.
fn truncate_preview(command: &str) -> String {
    let flat = command.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let head: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("ls -la"), "ls -la");
        let long = "x".repeat(60);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_task_line_updates_do_not_panic() {
        let dash = Dashboard::new();
        let mut line = dash.register("echo hello");
        line.update("some output\n");
        line.update("more");
        line.finish();
    }
}
