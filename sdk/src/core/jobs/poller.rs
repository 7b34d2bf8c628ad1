//! Status Poller
//!
//! Repeated status reads for one job until it reaches a terminal state or the
//! poll budget runs out. Polls for a single job are strictly sequential; the only
//! suspension points are the sleeps between polls and between transient retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{JobHandle, JobResult, JobStatus, RawStatus, StatusObservation};
use crate::core::config::{BackoffKind, ClientConfig};
use crate::core::transport::{StatusReply, Transport};
use crate::core::{ClientError, ClientResult};

// =============================================================================
// Backoff
// =============================================================================

/// Delay between consecutive polls of the same job.
///
/// Every policy is monotone non-decreasing in the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBackoff {
    Constant {
        interval: Duration,
    },
    Linear {
        initial: Duration,
        step: Duration,
        max: Duration,
    },
    Exponential {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
}

impl PollBackoff {
    pub fn constant(interval: Duration) -> Self {
        PollBackoff::Constant { interval }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let interval = config.poll_interval();
        let max = config.max_poll_interval().max(interval);
        match config.backoff {
            BackoffKind::Constant => PollBackoff::Constant { interval },
            BackoffKind::Linear => PollBackoff::Linear {
                initial: interval,
                step: interval,
                max,
            },
            BackoffKind::Exponential => PollBackoff::Exponential {
                initial: interval,
                factor: 2,
                max,
            },
        }
    }

    /// Delay before poll `attempt + 1`, where attempt 0 follows the first poll
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            PollBackoff::Constant { interval } => interval,
            PollBackoff::Linear { initial, step, max } => {
                let grown = initial.saturating_add(step.saturating_mul(attempt));
                grown.min(max.max(initial))
            }
            PollBackoff::Exponential {
                initial,
                factor,
                max,
            } => {
                let multiplier = factor.max(1).saturating_pow(attempt);
                initial
                    .saturating_mul(multiplier)
                    .min(max.max(initial))
            }
        }
    }
}

// =============================================================================
// Poll Options
// =============================================================================

/// Budget and pacing for one `poll_until_terminal` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Poller's own budget
    pub timeout: Duration,
    pub backoff: PollBackoff,
}

impl PollOptions {
    /// Fixed interval polling
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            backoff: PollBackoff::constant(poll_interval),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            timeout: config.poll_timeout(),
            backoff: PollBackoff::from_config(config),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Bounded retry of a single status read after a transient transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientRetry {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Delay before the first retry; doubles per attempt
    pub base_delay: Duration,
}

impl TransientRetry {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            retries: config.transient_retries,
            base_delay: config.transient_retry_delay(),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for TransientRetry {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

// =============================================================================
// Status Poller
// =============================================================================

/// Observes job status through the shared transport
#[derive(Clone)]
pub struct StatusPoller {
    transport: Arc<dyn Transport>,
    retry: TransientRetry,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("transport", &self.transport.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl StatusPoller {
    pub fn new(transport: Arc<dyn Transport>, retry: TransientRetry) -> Self {
        Self { transport, retry }
    }

    /// Single status read, mapped to the canonical state
    pub async fn check_once(&self, handle: &JobHandle) -> ClientResult<JobStatus> {
        Ok(self.observe(handle).await?.status)
    }

    /// Single status read with everything the server reported.
    ///
    /// Transient transport failures are retried up to the configured bound
    /// before escalating.
    pub async fn observe(&self, handle: &JobHandle) -> ClientResult<StatusObservation> {
        let mut attempt = 0;
        loop {
            match self.transport.job_status(handle).await {
                Ok(reply) => return Ok(Self::to_observation(reply)),
                Err(e) if e.is_retryable() && attempt < self.retry.retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        job_id = %handle.job_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Status check failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn to_observation(reply: StatusReply) -> StatusObservation {
        let status = RawStatus::parse(&reply.raw_status).canonical();
        StatusObservation {
            status,
            raw_status: reply.raw_status,
            metadata: reply.metadata,
            raw_response: reply.raw_response,
        }
    }

    /// Polls until the job is terminal or the budget elapses
    pub async fn poll_until_terminal(
        &self,
        handle: &JobHandle,
        options: &PollOptions,
    ) -> ClientResult<JobResult> {
        self.poll_until_terminal_with(handle, options, |_| {}).await
    }

    /// Like `poll_until_terminal`, reporting every observation to `on_status`
    pub async fn poll_until_terminal_with<F>(
        &self,
        handle: &JobHandle,
        options: &PollOptions,
        mut on_status: F,
    ) -> ClientResult<JobResult>
    where
        F: FnMut(&StatusObservation) + Send,
    {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let observation = self.observe(handle).await?;
            polls += 1;
            on_status(&observation);

            debug!(
                job_id = %handle.job_id,
                poll = polls,
                status = %observation.status,
                raw_status = %observation.raw_status,
                "Polled job status"
            );

            if observation.status.is_terminal() {
                match observation.status {
                    JobStatus::Failed => warn!(
                        job_id = %handle.job_id,
                        polls,
                        "Job reported failed"
                    ),
                    _ => info!(job_id = %handle.job_id, polls, "Job completed"),
                }
                return Ok(JobResult {
                    job_id: handle.job_id.clone(),
                    status: observation.status,
                    metadata: observation.metadata,
                    raw_response: observation.raw_response,
                    polls,
                    completed_at: Utc::now(),
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= options.timeout {
                warn!(
                    job_id = %handle.job_id,
                    polls,
                    last_status = %observation.status,
                    "Poll budget exhausted"
                );
                return Err(ClientError::poll_timeout(
                    format!(
                        "Job {} still {} after {:.1}s ({} polls)",
                        handle.job_id,
                        observation.status,
                        elapsed.as_secs_f64(),
                        polls
                    ),
                    Some(observation.status),
                ));
            }

            let delay = options
                .backoff
                .delay(polls - 1)
                .min(options.timeout - elapsed);
            tokio::time::sleep(delay).await;
        }
    }
}
