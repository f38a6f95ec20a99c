//! Cooperative cancellation.
//!
//! The orchestrator cancels on `SIGINT`/`SIGTERM`; the resolver and every
//! in-flight shell observe the token at their next await point. Built on
//! `tokio::sync::watch` so any number of tasks can wait on one flag.

use tokio::sync::watch;

/// The sending half, held by the orchestrator's signal task.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Trip the flag; all outstanding tokens observe it.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// A cloneable token observed by resolver tasks.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a fresh handle/token pair.
    #[must_use]
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// Non-blocking check.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until cancelled. Never resolves if the handle is dropped
    /// without cancelling; callers race this against real work.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Handle dropped without cancelling: park forever so select!
            // arms racing against us keep running.
            std::future::pending::<()>().await;
        }
    }
}
