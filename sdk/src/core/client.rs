//! Labellerr Client
//!
//! The instrumented client surface. Every public operation is routed through one
//! `Interceptor` built at construction time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::core::config::ClientConfig;
use crate::core::instrument::{ArgList, ClientOperation, Interceptor};
use crate::core::jobs::{AsyncHandle, JobController, JobHandle, JobResult, JobStatus, PollOptions};
use crate::core::projects::{
    DatasetListing, DatasetQuery, ExportConfig, ExportCreated, ExportDownload,
    ExportStatusReport, ProjectCreated, ProjectSpec, ProjectsApi,
};
use crate::core::transport::Transport;
use crate::core::upload::UploadRequest;
use crate::core::{ClientError, ClientResult};

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`LabellerrClient`]
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the transport (the HTTP transport is used otherwise)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> ClientResult<LabellerrClient> {
        let mut config = self.config.unwrap_or_else(ClientConfig::from_env);
        config.normalize();

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&config)?,
        };

        debug!(
            transport = transport.name(),
            base_url = %config.base_url,
            "Creating Labellerr client"
        );

        Ok(LabellerrClient {
            inner: Arc::new(ClientInner {
                controller: JobController::new(transport.clone(), &config),
                projects: ProjectsApi::new(transport.clone()),
                interceptor: Interceptor::new(config.instrumentation.clone()),
                transport,
                config,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(feature = "http-transport")]
fn default_transport(config: &ClientConfig) -> ClientResult<Arc<dyn Transport>> {
    config.validate()?;
    Ok(Arc::new(crate::core::transport::HttpTransport::new(config)?))
}

#[cfg(not(feature = "http-transport"))]
fn default_transport(_config: &ClientConfig) -> ClientResult<Arc<dyn Transport>> {
    Err(ClientError::validation(
        "No transport configured: enable the `http-transport` feature or supply one",
    ))
}

// =============================================================================
// Client
// =============================================================================

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    controller: JobController,
    projects: ProjectsApi,
    interceptor: Interceptor,
    closed: AtomicBool,
}

/// Labellerr API client. Cheap to clone; clones share the transport and state.
#[derive(Clone)]
pub struct LabellerrClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for LabellerrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabellerrClient")
            .field("config", &self.inner.config)
            .field("transport", &self.inner.transport.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LabellerrClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client over the HTTP transport
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Poll options used when a call doesn't supply its own
    pub fn default_poll_options(&self) -> PollOptions {
        self.inner.controller.default_options()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::validation("client is closed"));
        }
        Ok(())
    }

    fn upload_args(request: &UploadRequest) -> ArgList {
        ArgList::new()
            .arg("project_id", request.project_id())
            .arg("client_id", request.client_id())
            .arg("format", request.format())
            .arg("file", request.source().file_name().unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // Annotation jobs
    // -------------------------------------------------------------------------

    /// Uploads annotations and waits for processing to finish
    pub async fn upload_sync(
        &self,
        request: &UploadRequest,
        timeout: Duration,
    ) -> ClientResult<JobResult> {
        let args = Self::upload_args(request).debug("timeout", timeout);
        self.inner
            .interceptor
            .run(ClientOperation::UploadSync, args, async {
                self.ensure_open()?;
                self.inner.controller.upload_sync(request, timeout).await
            })
            .await
    }

    /// Uploads annotations and returns a handle polled in the background
    pub async fn upload_async(&self, request: &UploadRequest) -> ClientResult<AsyncHandle> {
        self.upload_async_with(request, self.default_poll_options())
            .await
    }

    pub async fn upload_async_with(
        &self,
        request: &UploadRequest,
        options: PollOptions,
    ) -> ClientResult<AsyncHandle> {
        let args = Self::upload_args(request).debug("timeout", options.timeout);
        self.inner
            .interceptor
            .run(ClientOperation::UploadAsync, args, async {
                self.ensure_open()?;
                self.inner.controller.upload_async_with(request, options).await
            })
            .await
    }

    /// Resumes background polling of an already-submitted job
    pub async fn resume_job(
        &self,
        job: JobHandle,
        options: Option<PollOptions>,
    ) -> ClientResult<AsyncHandle> {
        let options = options.unwrap_or_else(|| self.default_poll_options());
        let args = ArgList::new()
            .arg("job_id", &job.job_id)
            .debug("timeout", options.timeout);
        self.inner
            .interceptor
            .run(ClientOperation::ResumeJob, args, async {
                self.ensure_open()?;
                Ok::<_, ClientError>(self.inner.controller.resume(job, options))
            })
            .await
    }

    /// Single status read for a job
    pub async fn check_job_status(&self, job: &JobHandle) -> ClientResult<JobStatus> {
        let args = ArgList::new().arg("job_id", &job.job_id);
        self.inner
            .interceptor
            .run(ClientOperation::CheckJobStatus, args, async {
                self.ensure_open()?;
                self.inner.controller.poller().check_once(job).await
            })
            .await
    }

    /// Polls an existing job inline until it is terminal or the budget elapses
    pub async fn poll_job(
        &self,
        job: &JobHandle,
        options: Option<PollOptions>,
    ) -> ClientResult<JobResult> {
        let options = options.unwrap_or_else(|| self.default_poll_options());
        let args = ArgList::new()
            .arg("job_id", &job.job_id)
            .debug("timeout", options.timeout);
        self.inner
            .interceptor
            .run(ClientOperation::PollJob, args, async {
                self.ensure_open()?;
                self.inner
                    .controller
                    .poller()
                    .poll_until_terminal(job, &options)
                    .await?
                    .into_outcome()
            })
            .await
    }

    // -------------------------------------------------------------------------
    // Projects, datasets, exports
    // -------------------------------------------------------------------------

    pub async fn create_project(&self, spec: &ProjectSpec) -> ClientResult<ProjectCreated> {
        let args = ArgList::new()
            .arg("project_name", &spec.project_name)
            .arg("client_id", &spec.client_id)
            .arg("data_type", spec.data_type.as_str());
        self.inner
            .interceptor
            .run(ClientOperation::CreateProject, args, async {
                self.ensure_open()?;
                self.inner.projects.create_project(spec).await
            })
            .await
    }

    pub async fn list_projects(&self, client_id: &str) -> ClientResult<Vec<Value>> {
        let args = ArgList::new().arg("client_id", client_id);
        self.inner
            .interceptor
            .run(ClientOperation::ListProjects, args, async {
                self.ensure_open()?;
                self.inner.projects.list_projects(client_id).await
            })
            .await
    }

    pub async fn list_datasets(&self, query: &DatasetQuery) -> ClientResult<DatasetListing> {
        let args = ArgList::new()
            .arg("client_id", &query.client_id)
            .arg("data_type", query.data_type.as_str())
            .arg("project_id", &query.project_id);
        self.inner
            .interceptor
            .run(ClientOperation::ListDatasets, args, async {
                self.ensure_open()?;
                self.inner.projects.list_datasets(query).await
            })
            .await
    }

    pub async fn create_local_export(
        &self,
        project_id: &str,
        client_id: &str,
        export: &ExportConfig,
    ) -> ClientResult<ExportCreated> {
        let args = ArgList::new()
            .arg("project_id", project_id)
            .arg("client_id", client_id)
            .arg("export_name", &export.export_name);
        self.inner
            .interceptor
            .run(ClientOperation::CreateLocalExport, args, async {
                self.ensure_open()?;
                self.inner
                    .projects
                    .create_local_export(project_id, client_id, export)
                    .await
            })
            .await
    }

    /// Progress of previously created exports, with download details for ready ones
    pub async fn check_export_status(
        &self,
        project_id: &str,
        report_ids: &[String],
        client_id: &str,
    ) -> ClientResult<ExportStatusReport> {
        let args = ArgList::new()
            .arg("project_id", project_id)
            .arg("client_id", client_id)
            .debug("report_ids", report_ids);
        self.inner
            .interceptor
            .run(ClientOperation::CheckExportStatus, args, async {
                self.ensure_open()?;
                self.inner
                    .projects
                    .check_export_status(project_id, report_ids, client_id)
                    .await
            })
            .await
    }

    pub async fn fetch_download_url(
        &self,
        project_id: &str,
        export_id: &str,
        client_id: &str,
    ) -> ClientResult<ExportDownload> {
        let args = ArgList::new()
            .arg("project_id", project_id)
            .arg("export_id", export_id)
            .arg("client_id", client_id);
        self.inner
            .interceptor
            .run(ClientOperation::FetchDownloadUrl, args, async {
                self.ensure_open()?;
                self.inner
                    .projects
                    .fetch_download_url(project_id, export_id, client_id)
                    .await
            })
            .await
    }

    /// Marks the client closed. Later calls fail with a validation error;
    /// background polls already running finish on their own budget.
    pub async fn close(&self) -> ClientResult<()> {
        self.inner
            .interceptor
            .run(ClientOperation::Close, ArgList::new(), async {
                if !self.inner.closed.swap(true, Ordering::SeqCst) {
                    debug!("Labellerr client closed");
                }
                Ok::<_, ClientError>(())
            })
            .await
    }
}
