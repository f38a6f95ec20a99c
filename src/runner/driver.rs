//! Driver process spawning and exit-code relay.
//!
//! The driver inherits our stdio so interactive sessions work untouched.
//! Its pid sits in a single-slot cell while it runs (the signal handler
//! reads it), and the spawn task races the child against the cancellation
//! token: on cancel the child is killed and the run reports the signal.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::debug;

use crate::core::{CancelToken, MdflowError};

/// Single-slot cell holding the pid of the currently running child.
pub type ChildCell = Arc<Mutex<Option<u32>>>;

/// Create an empty child cell.
#[must_use]
pub fn new_child_cell() -> ChildCell {
    Arc::new(Mutex::new(None))
}

/// Fully prepared driver invocation, consumed once.
#[derive(Debug, Clone)]
pub struct DriverInvocation {
    /// Driver binary name (`claude`, `codex`, ...).
    pub program: String,
    /// Compiled argument vector, subcommand prefix included.
    pub argv: Vec<String>,
    /// Environment additions from the front matter's `env` mapping.
    pub env: Vec<(String, String)>,
    /// Working directory for the driver.
    pub cwd: PathBuf,
}

/// Spawn the driver and wait, returning its exit code.
///
/// # Errors
///
/// - [`MdflowError::DriverNotFound`] when the binary is not on `PATH`
/// - [`MdflowError::Interrupted`] when cancellation fires first
pub async fn spawn_driver(
    invocation: &DriverInvocation,
    child_cell: &ChildCell,
    cancel: &CancelToken,
    signal_name: &Arc<Mutex<Option<&'static str>>>,
) -> Result<i32> {
    let program = which::which(&invocation.program).map_err(|_| MdflowError::DriverNotFound {
        name: invocation.program.clone(),
    })?;

    debug!("Spawning driver: {} {:?}", program.display(), invocation.argv);

    let mut child = Command::new(&program)
        .args(&invocation.argv)
        .current_dir(&invocation.cwd)
        .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .spawn()
        .map_err(|e| MdflowError::CommandFailed {
            message: format!("failed to spawn driver '{}': {e}", invocation.program),
        })?;

    *child_cell.lock().expect("child cell lock never poisoned") = child.id();

    let mut cancel = cancel.clone();
    let result = tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| MdflowError::CommandFailed {
                message: format!("failed to wait for driver: {e}"),
            })?;
            Ok(exit_code_of(status))
        }
        () = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            let signal = signal_name
                .lock()
                .expect("signal cell lock never poisoned")
                .unwrap_or("SIGINT");
            Err(MdflowError::Interrupted { signal }.into())
        }
    };

    *child_cell.lock().expect("child cell lock never poisoned") = None;
    result
}

/// Map an exit status to the code we relay: the child's own code, or
/// `128 + signal` when it died to a signal.
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str, argv: &[&str]) -> DriverInvocation {
        DriverInvocation {
            program: program.to_string(),
            argv: argv.iter().map(ToString::to_string).collect(),
            env: Vec::new(),
            cwd: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn test_driver_not_found() {
        let (_handle, cancel) = CancelToken::new();
        let err = spawn_driver(
            &invocation("definitely-not-a-real-binary-7af3", &[]),
            &new_child_cell(),
            &cancel,
            &Arc::new(Mutex::new(None)),
        )
        .await
        .unwrap_err();
        match err.downcast_ref::<MdflowError>() {
            Some(MdflowError::DriverNotFound { name }) => {
                assert!(name.contains("definitely-not"));
            }
            other => panic!("expected DriverNotFound, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_relayed() {
        let (_handle, cancel) = CancelToken::new();
        let cell = new_child_cell();
        let code = spawn_driver(
            &invocation("sh", &["-c", "exit 7"]),
            &cell,
            &cancel,
            &Arc::new(Mutex::new(None)),
        )
        .await
        .unwrap();
        assert_eq!(code, 7);
        assert!(cell.lock().unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_driver() {
        let (handle, cancel) = CancelToken::new();
        let signal_name = Arc::new(Mutex::new(Some("SIGTERM")));
        let cell = new_child_cell();
        let task = tokio::spawn({
            let cell = cell.clone();
            let cancel = cancel.clone();
            let signal_name = signal_name.clone();
            async move {
                spawn_driver(&invocation("sleep", &["30"]), &cell, &cancel, &signal_name).await
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        handle.cancel();
        let err = task.await.unwrap().unwrap_err();
        match err.downcast_ref::<MdflowError>() {
            Some(MdflowError::Interrupted { signal }) => assert_eq!(*signal, "SIGTERM"),
            other => panic!("expected Interrupted, got {other:?}"),
        }
    }
}
