//! Inline command and executable code fence execution.
//!
//! Both directive kinds funnel through one capture pipeline: spawn with
//! piped stdout/stderr, stream stdout chunks to the dashboard, race
//! completion against the 30-second timeout and the cancellation token,
//! then sanitize the output (binary check, ANSI strip, raw-terminator
//! defusal, truncation) before it is wrapped `{% raw %} ... {% endraw %}`
//! for the later template pass.

use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::constants::{COMMAND_BINARY_CHECK_LEN, COMMAND_TIMEOUT, MAX_COMMAND_OUTPUT};
use crate::core::{CancelToken, MdflowError};
use crate::resolver::dashboard::Dashboard;
use crate::template::{sanitize_raw_terminator, wrap_raw, TemplateEngine};
use crate::utils::platform::shell_command;

/// CSI and other ANSI escape sequences.
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-Z\\^_]").unwrap());

/// Bare markdown-file invocations: optional `./`, `../`, `~/`, or `/`
/// prefix, ending in `.md`.
static MARKDOWN_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\./|\.\./|~/|/)?[^\s]+\.md$").unwrap());

/// Execution context shared by every command and fence in one resolution.
#[derive(Clone)]
pub struct ExecContext {
    /// Working directory: `_cwd` from front matter when present, else the
    /// containing file's directory.
    pub cwd: PathBuf,
    /// Extra environment for spawned processes (the front matter's `env`
    /// mapping), layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Current template variable bindings, substituted into command text.
    pub vars: BTreeMap<String, String>,
    /// The outer tool's own binary name, for markdown-file recursion.
    pub tool_name: String,
    /// Dry-run mode: emit placeholders instead of executing.
    pub dry_run: bool,
    /// Shared template engine.
    pub engine: Arc<TemplateEngine>,
    /// Cancellation observed between and during spawns.
    pub cancel: CancelToken,
    /// Live progress surface.
    pub dashboard: Dashboard,
}

/// Output of one capture run.
struct Captured {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

/// Run an inline `` !`command` `` directive and return its wrapped output.
pub async fn run_inline_command(text: &str, ctx: &ExecContext) -> Result<String> {
    // The command text may itself reference template variables.
    let mut command = ctx.engine.render(text, &ctx.vars)?;

    // A bare markdown file reruns the outer tool recursively.
    if MARKDOWN_COMMAND.is_match(command.trim()) {
        command = format!("{} {}", ctx.tool_name, command.trim());
    }

    debug!("Running inline command: {command}");

    if ctx.dry_run {
        return Ok(wrap_raw(&format!("[Dry Run: Command \"{command}\" not executed]")));
    }

    let (shell, prefix) = shell_command();
    let mut cmd = Command::new(shell);
    cmd.args(prefix)
        .arg(&command)
        .current_dir(&ctx.cwd)
        .envs(ctx.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let captured = capture(cmd, &command, ctx).await?;
    finish_command_output(&command, captured)
}

/// Run an executable code fence: write the script to a temp file, mark it
/// executable, and let the shebang pick the interpreter.
pub async fn run_exec_fence(
    info_string: &str,
    shebang: &str,
    code: &str,
    ctx: &ExecContext,
) -> Result<String> {
    let preview = format!("{shebang} ({})", fence_language(info_string));
    debug!("Running code fence: {preview}");

    if ctx.dry_run {
        return Ok(wrap_raw("[Dry Run: Code fence not executed]"));
    }

    let script = format!("{shebang}\n{code}");
    let temp = tempfile::Builder::new()
        .prefix("mdflow-fence-")
        .suffix(&format!(".{}", fence_extension(info_string)))
        .tempfile()
        .map_err(|e| MdflowError::CommandFailed { message: format!("cannot create temp script: {e}") })?;
    std::fs::write(temp.path(), &script)
        .map_err(|e| MdflowError::CommandFailed { message: format!("cannot write temp script: {e}") })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o755)).map_err(
            |e| MdflowError::CommandFailed { message: format!("cannot mark script executable: {e}") },
        )?;
    }

    let mut cmd = Command::new(temp.path());
    cmd.current_dir(&ctx.cwd)
        .envs(ctx.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // The NamedTempFile guard deletes the script on every exit path.
    let captured = capture(cmd, &preview, ctx).await?;

    match captured.code {
        Some(0) => {
            let sanitized = sanitize_output(&captured.stdout, &captured.stderr)?;
            Ok(wrap_raw(&sanitized))
        }
        code => Err(MdflowError::CodeFenceFailed {
            code: code.unwrap_or(-1),
            stderr: if captured.stderr.is_empty() { captured.stdout } else { captured.stderr },
        }
        .into()),
    }
}

/// Spawn, stream, and wait with timeout and cancellation.
async fn capture(mut cmd: Command, display: &str, ctx: &ExecContext) -> Result<Captured> {
    if ctx.cancel.is_cancelled() {
        return Err(MdflowError::UserCancelled.into());
    }

    let mut child = cmd.spawn().map_err(|e| MdflowError::CommandFailed {
        message: format!("failed to spawn \"{display}\": {e}"),
    })?;

    let mut stdout_pipe = child.stdout.take().expect("stdout is piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr is piped");
    let mut line = Some(ctx.dashboard.register(display));
    let mut cancel = ctx.cancel.clone();

    let work = async {
        let mut stdout_buf: Vec<u8> = Vec::new();
        let mut stderr_buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];

        let stderr_task = async {
            let _ = stderr_pipe.read_to_end(&mut stderr_buf).await;
            stderr_buf
        };

        let stdout_task = async {
            loop {
                match stdout_pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        stdout_buf.extend_from_slice(&chunk[..n]);
                        if let Some(line) = line.as_mut() {
                            line.update(&String::from_utf8_lossy(&chunk[..n]));
                        }
                    }
                }
            }
            stdout_buf
        };

        let (stdout_buf, stderr_buf) = tokio::join!(stdout_task, stderr_task);
        let status = child.wait().await;
        (stdout_buf, stderr_buf, status)
    };

    let outcome = tokio::select! {
        result = tokio::time::timeout(COMMAND_TIMEOUT, work) => result,
        () = cancel.cancelled() => {
            return Err(MdflowError::UserCancelled.into());
        }
    };

    let result = match outcome {
        Ok((stdout_buf, stderr_buf, status)) => {
            let status = status.map_err(|e| MdflowError::CommandFailed {
                message: format!("failed to wait for \"{display}\": {e}"),
            })?;
            Ok(Captured {
                stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
                code: status.code(),
            })
        }
        Err(_) => Err(MdflowError::CommandFailed {
            message: format!(
                "\"{display}\" timed out after {}s",
                COMMAND_TIMEOUT.as_secs()
            ),
        }
        .into()),
    };

    if let Some(line) = line.take() {
        line.finish();
    }
    result
}

/// Post-exit handling for inline commands: exit-code check plus output
/// sanitization and wrapping.
fn finish_command_output(command: &str, captured: Captured) -> Result<String> {
    match captured.code {
        Some(0) => {}
        code => {
            let detail = if captured.stderr.trim().is_empty() {
                captured.stdout.trim().to_string()
            } else {
                captured.stderr.trim().to_string()
            };
            return Err(MdflowError::CommandFailed {
                message: format!(
                    "\"{command}\" exited with code {}: {detail}",
                    code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                ),
            }
            .into());
        }
    }

    let sanitized = sanitize_output(&captured.stdout, &captured.stderr)?;
    Ok(wrap_raw(&sanitized))
}

/// Shared output sanitization: binary check, ANSI strip, raw-terminator
/// defusal, truncation, stderr/stdout combination.
fn sanitize_output(stdout: &str, stderr: &str) -> Result<String> {
    let head = &stdout.as_bytes()[..stdout.len().min(COMMAND_BINARY_CHECK_LEN)];
    if head.contains(&0) {
        return Err(MdflowError::CommandFailed {
            message: "command produced binary output".to_string(),
        }
        .into());
    }

    let combine = |text: &str| -> String {
        let stripped = ANSI_ESCAPE.replace_all(text, "");
        sanitize_raw_terminator(stripped.trim_end())
    };

    let stdout = combine(stdout);
    let stderr = combine(stderr);
    let mut output = match (stderr.is_empty(), stdout.is_empty()) {
        (false, false) => format!("{stderr}\n{stdout}"),
        (false, true) => stderr,
        _ => stdout,
    };

    if output.chars().count() > MAX_COMMAND_OUTPUT {
        output = output.chars().take(MAX_COMMAND_OUTPUT).collect();
        output.push_str("\n[output truncated at 100000 characters]");
    }
    Ok(output)
}

/// Language token of a fence info string (first whitespace-separated word).
fn fence_language(info_string: &str) -> String {
    info_string.split_whitespace().next().unwrap_or("").to_string()
}

/// Pick a temp-file extension for a fence language.
fn fence_extension(info_string: &str) -> String {
    match fence_language(info_string).as_str() {
        "" => "sh".to_string(),
        "typescript" => "ts".to_string(),
        "javascript" => "js".to_string(),
        "python" => "py".to_string(),
        lang @ ("ts" | "js" | "py" | "sh" | "bash") => lang.to_string(),
        other => other.to_string(),
    }
}
