//! Job Controller
//!
//! Composes upload submission and status polling into an inline call that returns
//! the terminal result, and a background variant that returns an `AsyncHandle`
//! as soon as the upload is acknowledged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::debug;

use super::{AsyncHandle, JobHandle, JobResult, PollOptions, StatusPoller, TransientRetry};
use crate::core::config::ClientConfig;
use crate::core::instrument::{ClientOperation, Interceptor};
use crate::core::transport::Transport;
use crate::core::upload::{UploadRequest, UploadSubmitter};
use crate::core::ClientResult;

/// Orchestrates submit + poll for annotation uploads
#[derive(Debug, Clone)]
pub struct JobController {
    submitter: UploadSubmitter,
    poller: StatusPoller,
    defaults: PollOptions,
    /// Bounds concurrently running background poll loops
    permits: Arc<Semaphore>,
    /// Reports failures that settle in the background
    interceptor: Interceptor,
}

impl JobController {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            submitter: UploadSubmitter::new(transport.clone()),
            poller: StatusPoller::new(transport, TransientRetry::from_config(config)),
            defaults: PollOptions::from_config(config),
            permits: Arc::new(Semaphore::new(config.max_background_jobs.max(1))),
            interceptor: Interceptor::new(config.instrumentation.clone()),
        }
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    /// Poll options used when a call doesn't supply its own
    pub fn default_options(&self) -> PollOptions {
        self.defaults
    }

    /// Uploads and polls inline until the job is terminal or `timeout` elapses
    pub async fn upload_sync(
        &self,
        request: &UploadRequest,
        timeout: Duration,
    ) -> ClientResult<JobResult> {
        self.upload_sync_with(request, &self.defaults.with_timeout(timeout))
            .await
    }

    pub async fn upload_sync_with(
        &self,
        request: &UploadRequest,
        options: &PollOptions,
    ) -> ClientResult<JobResult> {
        let job = self.submitter.submit(request).await?;
        self.poller
            .poll_until_terminal(&job, options)
            .await?
            .into_outcome()
    }

    /// Uploads inline, then polls in the background.
    ///
    /// Validation and submission failures are returned directly; everything after
    /// the acknowledgement surfaces through the handle.
    pub async fn upload_async(&self, request: &UploadRequest) -> ClientResult<AsyncHandle> {
        self.upload_async_with(request, self.defaults).await
    }

    pub async fn upload_async_with(
        &self,
        request: &UploadRequest,
        options: PollOptions,
    ) -> ClientResult<AsyncHandle> {
        let job = self.submitter.submit(request).await?;
        Ok(self.spawn_poll(job, options, ClientOperation::UploadAsync))
    }

    /// Starts a background poll for an already-submitted job. Nothing is re-uploaded.
    pub fn resume(&self, job: JobHandle, options: PollOptions) -> AsyncHandle {
        self.spawn_poll(job, options, ClientOperation::ResumeJob)
    }

    fn spawn_poll(
        &self,
        job: JobHandle,
        options: PollOptions,
        operation: ClientOperation,
    ) -> AsyncHandle {
        debug!(
            job_id = %job.job_id,
            operation = operation.as_str(),
            timeout_secs = options.timeout.as_secs(),
            "Scheduling background poll"
        );
        AsyncHandle::spawn(
            job,
            self.poller.clone(),
            options,
            self.permits.clone(),
            self.interceptor.clone(),
            operation,
        )
    }
}
