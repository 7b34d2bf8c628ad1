//! Annotation Upload
//!
//! Request types and the submitter that turns a validated request into a job handle.
//! Validation is purely local: nothing here touches the network until the request
//! has passed every precondition.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::jobs::JobHandle;
use crate::core::transport::Transport;
use crate::core::{AnnotationFormat, ClientError, ClientResult, ConfidenceBucket};

// =============================================================================
// Request Types
// =============================================================================

/// Where the annotation payload comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationSource {
    /// File on the local filesystem, read at upload time
    Path(PathBuf),
    /// In-memory payload with the file name it should be stored under
    Bytes { file_name: String, data: Vec<u8> },
}

impl AnnotationSource {
    pub fn bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        AnnotationSource::Bytes {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// File name as it will be stored on the platform
    pub fn file_name(&self) -> Option<String> {
        match self {
            AnnotationSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string()),
            AnnotationSource::Bytes { file_name, .. } => {
                let trimmed = file_name.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }

    /// Loads the payload
    pub async fn read(&self) -> ClientResult<Vec<u8>> {
        match self {
            AnnotationSource::Path(path) => Ok(tokio::fs::read(path).await?),
            AnnotationSource::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

impl From<PathBuf> for AnnotationSource {
    fn from(path: PathBuf) -> Self {
        AnnotationSource::Path(path)
    }
}

impl From<&Path> for AnnotationSource {
    fn from(path: &Path) -> Self {
        AnnotationSource::Path(path.to_path_buf())
    }
}

/// One pre-annotation upload, immutable once built
#[derive(Debug, Clone)]
pub struct UploadRequest {
    project_id: String,
    client_id: String,
    /// Kept as supplied so an unsupported value surfaces from `submit`
    format: String,
    source: AnnotationSource,
    confidence: Option<ConfidenceBucket>,
}

impl UploadRequest {
    pub fn new(
        project_id: impl Into<String>,
        client_id: impl Into<String>,
        format: impl Into<String>,
        source: impl Into<AnnotationSource>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            client_id: client_id.into(),
            format: format.into(),
            source: source.into(),
            confidence: None,
        }
    }

    pub fn with_confidence_bucket(mut self, bucket: ConfidenceBucket) -> Self {
        self.confidence = Some(bucket);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn source(&self) -> &AnnotationSource {
        &self.source
    }

    pub fn confidence(&self) -> Option<ConfidenceBucket> {
        self.confidence
    }

    /// Project/client pair the upload is addressed to
    pub fn target(&self) -> UploadTarget {
        UploadTarget {
            project_id: self.project_id.trim().to_string(),
            client_id: self.client_id.trim().to_string(),
        }
    }

    /// Checks every local precondition. Touches the local filesystem only.
    pub async fn validate(&self) -> ClientResult<ValidatedUpload> {
        if self.project_id.trim().is_empty() {
            return Err(ClientError::validation("project_id is required"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ClientError::validation("client_id is required"));
        }

        let format: AnnotationFormat = self.format.parse().map_err(ClientError::validation)?;

        let file_name = self
            .source
            .file_name()
            .ok_or_else(|| ClientError::validation("Annotation file name is required"))?;

        if let Some(ext) = format.required_extension() {
            let matches = Path::new(&file_name)
                .extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
                .unwrap_or(false);
            if !matches {
                return Err(ClientError::validation(format!(
                    "Format '{}' requires a .{} file, got '{}'",
                    format, ext, file_name
                )));
            }
        }

        let byte_len = match &self.source {
            AnnotationSource::Path(path) => {
                let metadata = tokio::fs::metadata(path).await.map_err(|_| {
                    ClientError::validation(format!(
                        "Annotation file not found: {}",
                        path.display()
                    ))
                })?;
                if !metadata.is_file() {
                    return Err(ClientError::validation(format!(
                        "Annotation path is not a file: {}",
                        path.display()
                    )));
                }
                metadata.len()
            }
            AnnotationSource::Bytes { data, .. } => data.len() as u64,
        };

        if byte_len == 0 {
            return Err(ClientError::validation(format!(
                "Annotation file is empty: {}",
                file_name
            )));
        }

        Ok(ValidatedUpload {
            format,
            confidence: self.confidence,
            file_name,
            byte_len,
            source: self.source.clone(),
        })
    }
}

/// Project/client pair an upload is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTarget {
    pub project_id: String,
    pub client_id: String,
}

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub format: AnnotationFormat,
    pub confidence: Option<ConfidenceBucket>,
    pub file_name: String,
    pub byte_len: u64,
    pub source: AnnotationSource,
}

impl ValidatedUpload {
    /// Storage path on the platform side: `{project}/{format}-{file}`
    pub fn storage_path(&self, target: &UploadTarget) -> String {
        format!("{}/{}-{}", target.project_id, self.format, self.file_name)
    }
}

// =============================================================================
// Upload Submitter
// =============================================================================

/// Validates requests and sends exactly one upload per call
#[derive(Clone)]
pub struct UploadSubmitter {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for UploadSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSubmitter")
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl UploadSubmitter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Validates and uploads the request, returning the job handle from the acknowledgement
    pub async fn submit(&self, request: &UploadRequest) -> ClientResult<JobHandle> {
        let upload = request.validate().await?;
        let target = request.target();

        debug!(
            project_id = %target.project_id,
            format = %upload.format,
            bytes = upload.byte_len,
            "Uploading annotations"
        );

        let ack = self.transport.upload_annotations(&upload, &target).await?;

        let job_id = ack.job_id.trim();
        if job_id.is_empty() {
            return Err(ClientError::transport(
                "Upload acknowledged without a job id",
            ));
        }

        info!(
            job_id = %job_id,
            project_id = %target.project_id,
            "Pre-annotation upload submitted"
        );

        Ok(JobHandle::new(job_id, target.project_id, target.client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{MockTransport, UploadAck};
    use crate::core::ErrorKind;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[tokio::test]
    async fn test_validate_accepts_coco_json_file() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "ann.json", b"{\"images\":[]}");

        let upload = UploadRequest::new("proj-1", "client-1", "coco", path)
            .validate()
            .await
            .unwrap();

        assert_eq!(upload.format, AnnotationFormat::CocoJson);
        assert_eq!(upload.file_name, "ann.json");
        assert_eq!(upload.byte_len, 13);
    }

    #[tokio::test]
    async fn test_validate_rejects_unknown_format() {
        let request = UploadRequest::new("p", "c", "xml", AnnotationSource::bytes("a.xml", "x"));
        let err = request.validate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("xml"));
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_ids() {
        let source = AnnotationSource::bytes("a.json", "{}");
        let err = UploadRequest::new(" ", "c", "json", source.clone())
            .validate()
            .await
            .unwrap_err();
        assert!(err.message().contains("project_id"));

        let err = UploadRequest::new("p", "", "json", source)
            .validate()
            .await
            .unwrap_err();
        assert!(err.message().contains("client_id"));
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_and_empty_files() {
        let temp = TempDir::new().unwrap();

        let err = UploadRequest::new("p", "c", "json", temp.path().join("nope.json"))
            .validate()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("not found"));

        let empty = write_file(&temp, "empty.json", b"");
        let err = UploadRequest::new("p", "c", "json", empty)
            .validate()
            .await
            .unwrap_err();
        assert!(err.message().contains("empty"));

        let err = UploadRequest::new("p", "c", "json", temp.path().to_path_buf())
            .validate()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_validate_coco_requires_json_extension() {
        let err = UploadRequest::new("p", "c", "coco_json", AnnotationSource::bytes("ann.csv", "x"))
            .validate()
            .await
            .unwrap_err();
        assert!(err.message().contains(".json"));

        assert!(UploadRequest::new("p", "c", "csv", AnnotationSource::bytes("ann.csv", "x"))
            .validate()
            .await
            .is_ok());
    }

    #[test]
    fn test_storage_path() {
        let upload = ValidatedUpload {
            format: AnnotationFormat::CocoJson,
            confidence: None,
            file_name: "ann.json".to_string(),
            byte_len: 1,
            source: AnnotationSource::bytes("ann.json", "x"),
        };
        let target = UploadTarget {
            project_id: "proj-1".to_string(),
            client_id: "c".to_string(),
        };
        assert_eq!(upload.storage_path(&target), "proj-1/coco_json-ann.json");
    }

    // =========================================================================
    // Submitter Tests
    // =========================================================================

    #[tokio::test]
    async fn test_submit_invalid_request_makes_no_transport_calls() {
        let transport = Arc::new(MockTransport::new());
        let submitter = UploadSubmitter::new(transport.clone());

        let request = UploadRequest::new("p", "c", "xml", AnnotationSource::bytes("a.json", "{}"));
        let err = submitter.submit(&request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_returns_handle_from_ack() {
        let transport = Arc::new(MockTransport::new().with_job_id("job-42"));
        let submitter = UploadSubmitter::new(transport.clone());

        let request =
            UploadRequest::new(" proj-1 ", "client-1", "json", AnnotationSource::bytes("a.json", "{}"));
        let handle = submitter.submit(&request).await.unwrap();

        assert_eq!(handle.job_id, "job-42");
        assert_eq!(handle.project_id, "proj-1");
        assert_eq!(handle.client_id, "client-1");
        assert_eq!(transport.upload_calls(), 1);
        assert_eq!(transport.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_does_not_retry_failed_upload() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next_upload(ClientError::http_status(503, "unavailable"));
        let submitter = UploadSubmitter::new(transport.clone());

        let request = UploadRequest::new("p", "c", "json", AnnotationSource::bytes("a.json", "{}"));
        let err = submitter.submit(&request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(transport.upload_calls(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_ack_without_job_id() {
        let transport = Arc::new(MockTransport::new());
        transport.push_upload_ack(UploadAck {
            job_id: "  ".to_string(),
            initial_status: None,
            raw_response: serde_json::Value::Null,
        });
        let submitter = UploadSubmitter::new(transport);

        let request = UploadRequest::new("p", "c", "json", AnnotationSource::bytes("a.json", "{}"));
        let err = submitter.submit(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
