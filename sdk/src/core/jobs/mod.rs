//! Job Tracking Module
//!
//! Lifecycle types for server-side annotation processing jobs, the status poller,
//! the background async handle and the controller that composes upload and polling.

mod controller;
mod handle;
mod poller;

pub use controller::*;
pub use handle::*;
pub use poller::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{ClientError, ClientResult, ClientId, JobId, Metadata, ProjectId};

// =============================================================================
// Job Status
// =============================================================================

/// Canonical job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether polling stops at this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Server vocabulary → canonical state. Keys are lowercase with `-`/space folded to `_`.
const STATUS_TABLE: &[(&str, JobStatus)] = &[
    ("queued", JobStatus::Queued),
    ("pending", JobStatus::Queued),
    ("submitted", JobStatus::Queued),
    ("waiting", JobStatus::Queued),
    ("created", JobStatus::Queued),
    ("processing", JobStatus::Processing),
    ("running", JobStatus::Processing),
    ("in_progress", JobStatus::Processing),
    ("started", JobStatus::Processing),
    ("uploading", JobStatus::Processing),
    ("completed", JobStatus::Completed),
    ("complete", JobStatus::Completed),
    ("succeeded", JobStatus::Completed),
    ("success", JobStatus::Completed),
    ("done", JobStatus::Completed),
    ("finished", JobStatus::Completed),
    ("failed", JobStatus::Failed),
    ("failure", JobStatus::Failed),
    ("error", JobStatus::Failed),
    ("errored", JobStatus::Failed),
    ("cancelled", JobStatus::Failed),
    ("canceled", JobStatus::Failed),
    ("aborted", JobStatus::Failed),
];

/// Raw status string as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawStatus {
    /// Present in the lookup table
    Known(JobStatus),
    /// Not (yet) known to this client
    Unrecognized(String),
}

impl RawStatus {
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        STATUS_TABLE
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, status)| RawStatus::Known(*status))
            .unwrap_or_else(|| RawStatus::Unrecognized(raw.trim().to_string()))
    }

    /// Canonical state; unrecognized strings are treated as still processing
    pub fn canonical(&self) -> JobStatus {
        match self {
            RawStatus::Known(status) => *status,
            RawStatus::Unrecognized(raw) => {
                warn!(raw_status = %raw, "Unrecognized job status, treating as processing");
                JobStatus::Processing
            }
        }
    }
}

// =============================================================================
// Job Handle
// =============================================================================

/// Handle correlating one submission with its status checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    /// Server-assigned job ID
    pub job_id: JobId,
    /// Project the annotations were uploaded to
    pub project_id: ProjectId,
    /// Client the project belongs to
    pub client_id: ClientId,
    /// When the submission was acknowledged
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(
        job_id: impl Into<String>,
        project_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            project_id: project_id.into(),
            client_id: client_id.into(),
            submitted_at: Utc::now(),
        }
    }
}

// =============================================================================
// Observations & Results
// =============================================================================

/// Outcome of a single status check
#[derive(Debug, Clone)]
pub struct StatusObservation {
    /// Canonical state
    pub status: JobStatus,
    /// String the server actually sent
    pub raw_status: String,
    /// Everything else the server reported about the job
    pub metadata: Metadata,
    /// Full response body
    pub raw_response: serde_json::Value,
}

/// Final outcome of a job once polling reached a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: JobId,
    /// Always terminal
    pub status: JobStatus,
    pub metadata: Metadata,
    pub raw_response: serde_json::Value,
    /// Number of status checks performed by the poll that produced this result
    pub polls: u32,
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Turns a platform-reported failure into a `ProcessingFailed` error
    pub fn into_outcome(self) -> ClientResult<JobResult> {
        match self.status {
            JobStatus::Completed => Ok(self),
            JobStatus::Failed => {
                let message = ["error", "message", "reason"]
                    .iter()
                    .find_map(|key| self.metadata.get(*key).and_then(|v| v.as_str()))
                    .unwrap_or("platform reported the job as failed")
                    .to_string();
                Err(ClientError::processing_failed(
                    self.job_id,
                    message,
                    self.metadata,
                ))
            }
            other => Err(ClientError::internal(format!(
                "Job result holds non-terminal status '{}'",
                other
            ))),
        }
    }
}
