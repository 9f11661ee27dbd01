// src/pipeline/worker.rs

//! Fire-and-forget job execution.
//!
//! Jobs run on a tracked task set and share one cancellation token. The
//! submitter only learns that a job was accepted; results stay inside the
//! job (logs, store contents).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Acknowledgement returned by [`Worker::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub job: String,
    pub accepted_at: DateTime<Utc>,
}

/// Background executor for long-running jobs.
#[derive(Debug, Clone, Default)]
pub struct Worker {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `job` in the background and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit<F, Fut>(&self, name: &str, job: F) -> Accepted
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let accepted = Accepted {
            job: name.to_string(),
            accepted_at: Utc::now(),
        };
        log::info!("Accepted job '{}'", name);
        self.tracker.spawn(job(self.cancel.clone()));
        accepted
    }

    /// Number of jobs still running.
    pub fn running(&self) -> usize {
        self.tracker.len()
    }

    /// Ask every job to stop at its next pause.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            log::warn!("Cancelling {} background job(s)", self.tracker.len());
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for every submitted job without cancelling.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel, then wait for every job to wind down.
    pub async fn shutdown(&self) {
        self.cancel();
        self.drain().await;
    }
}
