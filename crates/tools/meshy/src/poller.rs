//! Status polling for submitted tasks
//!
//! A poll loop retrieves the task, reports every snapshot to the caller,
//! and sleeps for the configured interval until the task reaches a
//! terminal status. Rate limiting (429) is waited out and retried without
//! reporting; any other failure ends the loop. Cancellation is checked
//! around every wait and every retrieval.

use crate::client::{MeshyClient, TaskRef};
use crate::error::{MeshyError, Result};
use crate::request::TaskRequest;
use crate::types::{Status, TaskResult};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};

impl MeshyClient {
    /// Poll `task` until it succeeds, fails or expires
    ///
    /// `on_progress` sees every snapshot retrieved, including the terminal
    /// one, and never sees rate-limited attempts. Returns the terminal
    /// snapshot; a failed or expired task is still `Ok` and carries its
    /// error in [`TaskResult::task_error`].
    pub async fn poll<F>(
        &self,
        task: &TaskRef,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<TaskResult>
    where
        F: FnMut(&TaskResult),
    {
        let mut last_status: Option<Status> = None;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MeshyError::Cancelled),
                fetched = self.fetch_task(task) => fetched,
            };

            let snapshot = match fetched {
                Ok(snapshot) => snapshot,
                Err(MeshyError::RateLimited { retry_after }) => {
                    let delay = self.config.rate_limit_delay(retry_after);
                    tracing::warn!("Rate limited while polling {}, retrying in {:?}", task, delay);
                    sleep_or_cancel(delay, cancel).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(previous) = last_status {
                if snapshot.status.rank() < previous.rank() {
                    tracing::warn!(
                        "Task {} went from {} back to {}",
                        task,
                        previous,
                        snapshot.status
                    );
                }
            }
            last_status = Some(snapshot.status);

            tracing::debug!("{}", snapshot.progress_report());
            on_progress(&snapshot);

            if snapshot.is_terminal() {
                tracing::info!("Task {} finished: {}", task, snapshot.status);
                return Ok(snapshot);
            }

            sleep_or_cancel(self.config.polling_interval, cancel).await?;
        }
    }

    /// Submit `request` and poll it to completion
    pub async fn submit_and_poll<F>(
        &self,
        request: &TaskRequest,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<TaskResult>
    where
        F: FnMut(&TaskResult),
    {
        let task = self.submit(request).await?;
        self.poll(&task, on_progress, cancel).await
    }

    /// Poll `task` on a background tokio task
    ///
    /// Snapshots are delivered through [`PollHandle::next_snapshot`]. Dropping
    /// the handle cancels the poll. Must be called from within a tokio
    /// runtime.
    pub fn spawn_poll(&self, task: TaskRef) -> PollHandle {
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let client = self.clone();
        let token = cancel.clone();
        let polled = task.clone();
        tokio::spawn(async move {
            let result = client
                .poll(
                    &polled,
                    |snapshot| {
                        let _ = snapshot_tx.send(snapshot.clone());
                    },
                    &token,
                )
                .await;
            let _ = result_tx.send(result);
        });

        PollHandle {
            task,
            _guard: cancel.clone().drop_guard(),
            cancel,
            snapshots: snapshot_rx,
            result_rx: Some(result_rx),
        }
    }
}

/// Handle for a poll running in the background
///
/// The poll stops when the handle is dropped.
pub struct PollHandle {
    task: TaskRef,
    cancel: CancellationToken,
    _guard: DropGuard,
    snapshots: mpsc::UnboundedReceiver<TaskResult>,
    result_rx: Option<oneshot::Receiver<Result<TaskResult>>>,
}

impl PollHandle {
    /// The task being polled
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Stop polling; the remote task is not affected
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether [`PollHandle::cancel`] was called or a timeout fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next snapshot, or `None` once polling has ended and all snapshots
    /// were consumed
    pub async fn next_snapshot(&mut self) -> Option<TaskResult> {
        self.snapshots.recv().await
    }

    /// Next snapshot if one is already queued
    pub fn try_next_snapshot(&mut self) -> Option<TaskResult> {
        self.snapshots.try_recv().ok()
    }

    /// Wait for the terminal snapshot
    pub async fn await_result(mut self) -> Result<TaskResult> {
        match self.result_rx.take() {
            Some(rx) => rx
                .await
                .map_err(|_| MeshyError::Channel("Poll task dropped its result".to_string()))?,
            None => Err(MeshyError::Channel("Result already consumed".to_string())),
        }
    }

    /// Wait for the terminal snapshot, giving up after `timeout`
    ///
    /// On timeout the poll is cancelled and the error carries `timeout`.
    pub async fn await_result_timeout(self, timeout: Duration) -> Result<TaskResult> {
        let cancel = self.cancel.clone();
        match tokio::time::timeout(timeout, self.await_result()).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(MeshyError::TimeoutError(timeout))
            }
        }
    }
}

impl fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHandle")
            .field("task", &self.task)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MeshyError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
