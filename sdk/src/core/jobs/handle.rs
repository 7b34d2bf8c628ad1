//! Async Job Handle
//!
//! A background task owns the poll loop for one job and publishes its progress
//! through a watch channel. The handle exposes a bounded wait that is independent
//! of the poller's own budget, and best-effort local cancellation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tracing::instrument::WithSubscriber;
use tracing::{debug, info};

use super::{JobHandle, JobResult, JobStatus, PollOptions, StatusPoller};
use crate::core::instrument::{ClientOperation, Interceptor};
use crate::core::{ClientError, ClientResult};

/// Lifecycle of an async handle. Leaves `Pending` exactly once.
#[derive(Debug, Clone)]
pub enum HandleState {
    Pending { last_status: Option<JobStatus> },
    Resolved(JobResult),
    Failed(ClientError),
    Cancelled,
}

impl HandleState {
    pub fn is_pending(&self) -> bool {
        matches!(self, HandleState::Pending { .. })
    }
}

/// Moves the state out of `Pending`. Returns false if it had already left.
fn settle(state: &watch::Sender<HandleState>, next: HandleState) -> bool {
    state.send_if_modified(|current| {
        if current.is_pending() {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// Resolves once the state has left `Pending`
async fn settled(rx: &mut watch::Receiver<HandleState>) -> HandleState {
    loop {
        {
            let state = rx.borrow_and_update();
            if !state.is_pending() {
                return state.clone();
            }
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

/// Resolves once the state is `Cancelled`
async fn cancelled(mut rx: watch::Receiver<HandleState>) {
    loop {
        if matches!(*rx.borrow_and_update(), HandleState::Cancelled) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Non-blocking handle to a job polled in the background
#[derive(Debug, Clone)]
pub struct AsyncHandle {
    job: JobHandle,
    state: Arc<watch::Sender<HandleState>>,
}

impl AsyncHandle {
    /// Spawns the single background poll loop for `job`.
    ///
    /// A failed outcome is reported through `interceptor` under `operation`, the
    /// call that started the poll, when the handle settles.
    pub(crate) fn spawn(
        job: JobHandle,
        poller: StatusPoller,
        options: PollOptions,
        permits: Arc<Semaphore>,
        interceptor: Interceptor,
        operation: ClientOperation,
    ) -> Self {
        let (tx, _) = watch::channel(HandleState::Pending { last_status: None });
        let state = Arc::new(tx);

        let task_state = state.clone();
        let task_job = job.clone();
        let task = async move {
            let started = Instant::now();
            let stop = cancelled(task_state.subscribe());

            let publisher = task_state.clone();
            let work = async {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| ClientError::internal("Background job pool is closed"))?;

                let poll = poller.poll_until_terminal_with(&task_job, &options, move |obs| {
                    publisher.send_if_modified(|current| match current {
                        HandleState::Pending { last_status } => {
                            *last_status = Some(obs.status);
                            true
                        }
                        _ => false,
                    });
                });

                AssertUnwindSafe(poll)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(ClientError::from_panic(payload)))
            };

            tokio::select! {
                outcome = work => match outcome.and_then(JobResult::into_outcome) {
                    Ok(result) => {
                        settle(&task_state, HandleState::Resolved(result));
                    }
                    Err(e) => {
                        if settle(&task_state, HandleState::Failed(e.clone())) {
                            interceptor.record_deferred_failure(
                                operation,
                                &task_job.job_id,
                                &e,
                                started.elapsed().as_millis() as u64,
                            );
                        }
                    }
                },
                _ = stop => {
                    debug!(job_id = %task_job.job_id, "Background poll stopped after cancellation");
                }
            }
        };
        tokio::spawn(task.with_current_subscriber());

        Self { job, state }
    }

    /// The job this handle tracks
    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    /// Snapshot of the current state
    pub fn state(&self) -> HandleState {
        self.state.borrow().clone()
    }

    /// Most recent status observed, if any
    pub fn last_status(&self) -> Option<JobStatus> {
        match &*self.state.borrow() {
            HandleState::Pending { last_status } => *last_status,
            HandleState::Resolved(result) => Some(result.status),
            HandleState::Failed(_) | HandleState::Cancelled => None,
        }
    }

    pub fn is_done(&self) -> bool {
        !self.state.borrow().is_pending()
    }

    /// Waits up to `timeout` for the outcome.
    ///
    /// A caller-side timeout leaves the background poll running. Once settled,
    /// every call returns the same outcome without polling again.
    pub async fn result(&self, timeout: Duration) -> ClientResult<JobResult> {
        let mut rx = self.state.subscribe();
        match tokio::time::timeout(timeout, settled(&mut rx)).await {
            Ok(state) => self.outcome(state),
            Err(_) => Err(ClientError::caller_timeout(
                format!(
                    "Job {} did not finish within the {:.1}s wait",
                    self.job.job_id,
                    timeout.as_secs_f64()
                ),
                self.last_status(),
            )),
        }
    }

    /// Waits for the outcome with no caller-side limit
    pub async fn wait(&self) -> ClientResult<JobResult> {
        let mut rx = self.state.subscribe();
        let state = settled(&mut rx).await;
        self.outcome(state)
    }

    /// Stops local polling if the job has not settled yet.
    ///
    /// Returns true if this call cancelled the handle. Server-side processing is
    /// not affected.
    pub fn cancel(&self) -> bool {
        let cancelled = settle(&self.state, HandleState::Cancelled);
        if cancelled {
            info!(
                job_id = %self.job.job_id,
                "Local polling cancelled; server-side processing continues"
            );
        }
        cancelled
    }

    fn outcome(&self, state: HandleState) -> ClientResult<JobResult> {
        match state {
            HandleState::Resolved(result) => Ok(result),
            HandleState::Failed(e) => Err(e),
            HandleState::Cancelled => Err(ClientError::internal(format!(
                "Polling cancelled for job {}",
                self.job.job_id
            ))),
            HandleState::Pending { .. } => Err(ClientError::internal(format!(
                "Job {} is still pending",
                self.job.job_id
            ))),
        }
    }
}
