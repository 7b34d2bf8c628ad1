//! Instrumentation Layer
//!
//! Uniform logging and error classification for the client surface.
//!
//! The surface is a closed set of [`ClientOperation`]s. The client builds one
//! [`Interceptor`] at construction and routes every operation through
//! [`Interceptor::run`], which:
//! 1. logs the call (arguments only when enabled, with redaction)
//! 2. logs success
//! 3. classifies any failure or panic into a [`ClientError`] and logs it once
//!
//! Operations on the exclusion list bypass all three steps.

mod args;
#[cfg(test)]
pub(crate) mod capture;

pub use args::ArgList;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub use crate::core::config::InstrumentationConfig;
use crate::core::{ClientError, ClientResult};

// =============================================================================
// Client Operations
// =============================================================================

/// Every public operation of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientOperation {
    UploadSync,
    UploadAsync,
    ResumeJob,
    CheckJobStatus,
    PollJob,
    CreateProject,
    ListProjects,
    ListDatasets,
    CreateLocalExport,
    CheckExportStatus,
    FetchDownloadUrl,
    Close,
}

impl ClientOperation {
    pub const ALL: [ClientOperation; 12] = [
        ClientOperation::UploadSync,
        ClientOperation::UploadAsync,
        ClientOperation::ResumeJob,
        ClientOperation::CheckJobStatus,
        ClientOperation::PollJob,
        ClientOperation::CreateProject,
        ClientOperation::ListProjects,
        ClientOperation::ListDatasets,
        ClientOperation::CreateLocalExport,
        ClientOperation::CheckExportStatus,
        ClientOperation::FetchDownloadUrl,
        ClientOperation::Close,
    ];

    /// Stable name used in logs and config lists
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientOperation::UploadSync => "upload_sync",
            ClientOperation::UploadAsync => "upload_async",
            ClientOperation::ResumeJob => "resume_job",
            ClientOperation::CheckJobStatus => "check_job_status",
            ClientOperation::PollJob => "poll_job",
            ClientOperation::CreateProject => "create_project",
            ClientOperation::ListProjects => "list_projects",
            ClientOperation::ListDatasets => "list_datasets",
            ClientOperation::CreateLocalExport => "create_local_export",
            ClientOperation::CheckExportStatus => "check_export_status",
            ClientOperation::FetchDownloadUrl => "fetch_download_url",
            ClientOperation::Close => "close",
        }
    }
}

impl std::fmt::Display for ClientOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| format!("Unknown client operation: {}", s))
    }
}

// =============================================================================
// Interceptor
// =============================================================================

/// Logging + classification wrapper, built once per client
#[derive(Debug, Clone, Default)]
pub struct Interceptor {
    config: InstrumentationConfig,
}

impl Interceptor {
    pub fn new(config: InstrumentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    fn listed(list: &[String], op: ClientOperation) -> bool {
        list.iter().any(|name| name.eq_ignore_ascii_case(op.as_str()))
    }

    pub fn is_excluded(&self, op: ClientOperation) -> bool {
        Self::listed(&self.config.excluded_operations, op)
    }

    fn logs_arguments(&self, op: ClientOperation) -> bool {
        self.config.log_arguments && !Self::listed(&self.config.quiet_operations, op)
    }

    /// Runs `fut` as operation `op`.
    ///
    /// Failures of any error type convertible into `ClientError`, and panics, come
    /// back classified with exactly one failure log entry.
    pub async fn run<T, E, F>(&self, op: ClientOperation, args: ArgList, fut: F) -> ClientResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ClientError>,
    {
        if self.is_excluded(op) {
            return fut.await.map_err(Into::into);
        }

        let operation = op.as_str();
        if self.logs_arguments(op) && !args.is_empty() {
            debug!(
                operation,
                args = %args.render(&self.config.redacted_params),
                "Calling operation"
            );
        } else {
            debug!(operation, "Calling operation");
        }

        let started = Instant::now();
        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let err = match outcome {
            Ok(Ok(value)) => {
                debug!(operation, elapsed_ms, "Operation completed");
                return Ok(value);
            }
            Ok(Err(e)) => e.into(),
            Err(payload) => ClientError::from_panic(payload),
        };

        error!(
            operation,
            kind = %err.kind(),
            elapsed_ms,
            "Operation failed: {}",
            err
        );
        Err(err)
    }

    /// Logs a failure that settled after `op` itself returned, i.e. the outcome
    /// of a background poll started by `op`. Called once per settled failure.
    pub fn record_deferred_failure(
        &self,
        op: ClientOperation,
        job_id: &str,
        err: &ClientError,
        elapsed_ms: u64,
    ) {
        if self.is_excluded(op) {
            return;
        }
        error!(
            operation = op.as_str(),
            job_id,
            kind = %err.kind(),
            elapsed_ms,
            "Operation failed: {}",
            err
        );
    }
}
