//! Blocking Client
//!
//! Thread-blocking facade over [`LabellerrClient`]. Owns a multi-thread tokio
//! runtime that also runs the background poll loops of async handles.
//!
//! Must not be used from inside an async runtime.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Runtime;

use crate::core::client::LabellerrClient;
use crate::core::config::ClientConfig;
use crate::core::jobs::{AsyncHandle, HandleState, JobHandle, JobResult, JobStatus, PollOptions};
use crate::core::projects::{
    DatasetListing, DatasetQuery, ExportConfig, ExportCreated, ExportDownload,
    ExportStatusReport, ProjectCreated, ProjectSpec,
};
use crate::core::transport::Transport;
use crate::core::upload::UploadRequest;
use crate::core::{ClientError, ClientResult};

fn build_runtime() -> ClientResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("labellerr-worker")
        .build()
        .map_err(|e| ClientError::internal_with_cause(format!("Failed to start runtime: {}", e), e))
}

/// Blocking Labellerr client
#[derive(Debug, Clone)]
pub struct BlockingClient {
    runtime: Arc<Runtime>,
    client: LabellerrClient,
}

impl BlockingClient {
    /// Client over the HTTP transport
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let runtime = build_runtime()?;
        let client = LabellerrClient::new(config)?;
        Ok(Self {
            runtime: Arc::new(runtime),
            client,
        })
    }

    /// Client over a caller-supplied transport
    pub fn from_client_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> ClientResult<Self> {
        let runtime = build_runtime()?;
        let client = LabellerrClient::builder()
            .config(config)
            .transport(transport)
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            client,
        })
    }

    /// The async client behind this facade
    pub fn client(&self) -> &LabellerrClient {
        &self.client
    }

    /// Uploads annotations and blocks the calling thread until processing finishes
    pub fn upload_sync(&self, request: &UploadRequest, timeout: Duration) -> ClientResult<JobResult> {
        self.runtime
            .block_on(self.client.upload_sync(request, timeout))
    }

    /// Uploads annotations, then returns while polling continues in the background
    pub fn upload_async(&self, request: &UploadRequest) -> ClientResult<BlockingAsyncHandle> {
        let handle = self.runtime.block_on(self.client.upload_async(request))?;
        Ok(self.wrap(handle))
    }

    pub fn upload_async_with(
        &self,
        request: &UploadRequest,
        options: PollOptions,
    ) -> ClientResult<BlockingAsyncHandle> {
        let handle = self
            .runtime
            .block_on(self.client.upload_async_with(request, options))?;
        Ok(self.wrap(handle))
    }

    pub fn resume_job(
        &self,
        job: JobHandle,
        options: Option<PollOptions>,
    ) -> ClientResult<BlockingAsyncHandle> {
        let handle = self.runtime.block_on(self.client.resume_job(job, options))?;
        Ok(self.wrap(handle))
    }

    pub fn check_job_status(&self, job: &JobHandle) -> ClientResult<JobStatus> {
        self.runtime.block_on(self.client.check_job_status(job))
    }

    pub fn poll_job(&self, job: &JobHandle, options: Option<PollOptions>) -> ClientResult<JobResult> {
        self.runtime.block_on(self.client.poll_job(job, options))
    }

    pub fn create_project(&self, spec: &ProjectSpec) -> ClientResult<ProjectCreated> {
        self.runtime.block_on(self.client.create_project(spec))
    }

    pub fn list_projects(&self, client_id: &str) -> ClientResult<Vec<Value>> {
        self.runtime.block_on(self.client.list_projects(client_id))
    }

    pub fn list_datasets(&self, query: &DatasetQuery) -> ClientResult<DatasetListing> {
        self.runtime.block_on(self.client.list_datasets(query))
    }

    pub fn create_local_export(
        &self,
        project_id: &str,
        client_id: &str,
        export: &ExportConfig,
    ) -> ClientResult<ExportCreated> {
        self.runtime
            .block_on(self.client.create_local_export(project_id, client_id, export))
    }

    pub fn check_export_status(
        &self,
        project_id: &str,
        report_ids: &[String],
        client_id: &str,
    ) -> ClientResult<ExportStatusReport> {
        self.runtime
            .block_on(self.client.check_export_status(project_id, report_ids, client_id))
    }

    pub fn fetch_download_url(
        &self,
        project_id: &str,
        export_id: &str,
        client_id: &str,
    ) -> ClientResult<ExportDownload> {
        self.runtime
            .block_on(self.client.fetch_download_url(project_id, export_id, client_id))
    }

    pub fn close(&self) -> ClientResult<()> {
        self.runtime.block_on(self.client.close())
    }

    fn wrap(&self, handle: AsyncHandle) -> BlockingAsyncHandle {
        BlockingAsyncHandle {
            handle,
            runtime: self.runtime.clone(),
        }
    }
}

/// Thread-blocking view of an [`AsyncHandle`]
#[derive(Debug, Clone)]
pub struct BlockingAsyncHandle {
    handle: AsyncHandle,
    runtime: Arc<Runtime>,
}

impl BlockingAsyncHandle {
    pub fn job(&self) -> &JobHandle {
        self.handle.job()
    }

    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.handle.last_status()
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Blocks the calling thread up to `timeout` for the outcome
    pub fn result(&self, timeout: Duration) -> ClientResult<JobResult> {
        self.runtime.block_on(self.handle.result(timeout))
    }

    /// Blocks until the job settles
    pub fn wait(&self) -> ClientResult<JobResult> {
        self.runtime.block_on(self.handle.wait())
    }

    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// The underlying async handle
    pub fn as_async(&self) -> &AsyncHandle {
        &self.handle
    }
}
