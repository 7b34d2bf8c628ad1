//! Transport Layer
//!
//! Authenticated access to the platform API. Everything above this trait is
//! transport-agnostic; the HTTP implementation and the scripted test double live
//! in submodules.

#[cfg(feature = "http-transport")]
mod http;
mod mock;

#[cfg(feature = "http-transport")]
pub use http::HttpTransport;
pub use mock::MockTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::jobs::JobHandle;
use crate::core::upload::{UploadTarget, ValidatedUpload};
use crate::core::{ClientError, ClientResult, Metadata};

/// Longest slice of an error body carried into a message
const MAX_ERROR_BODY_CHARS: usize = 500;

// =============================================================================
// Transport Types
// =============================================================================

/// Acknowledgement of an accepted upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadAck {
    pub job_id: String,
    /// Status reported alongside the acknowledgement, if any
    pub initial_status: Option<String>,
    pub raw_response: Value,
}

/// One job-status read
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReply {
    pub raw_status: String,
    /// Every other field the server reported about the job
    pub metadata: Metadata,
    pub raw_response: Value,
}

impl StatusReply {
    pub fn new(raw_status: impl Into<String>) -> Self {
        Self {
            raw_status: raw_status.into(),
            metadata: Metadata::new(),
            raw_response: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Generic API call used by the collaborator operations
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path below the base URL, starting with `/`
    pub path: String,
    /// Sent as the `client_id` header
    pub client_id: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            client_id: None,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            client_id: None,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Platform API access. Implementations must be safe to share across concurrent jobs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Uploads a validated annotation payload and starts its processing job.
    ///
    /// Called exactly once per submission; implementations must not retry.
    async fn upload_annotations(
        &self,
        upload: &ValidatedUpload,
        target: &UploadTarget,
    ) -> ClientResult<UploadAck>;

    /// Reads the current status of a job. Side-effect-free beyond the read.
    async fn job_status(&self, job: &JobHandle) -> ClientResult<StatusReply>;

    /// Performs a generic API call and returns the decoded JSON body
    async fn request(&self, request: ApiRequest) -> ClientResult<Value>;
}

// =============================================================================
// Response Handling
// =============================================================================

/// Maps an HTTP status and body into a decoded JSON value or a transport error
pub fn decode_response(status: u16, body: &str, request_id: &str) -> ClientResult<Value> {
    match status {
        200 | 201 => serde_json::from_str(body).map_err(|e| {
            ClientError::transport_with_cause(
                format!(
                    "Malformed response: expected JSON, got '{}'",
                    truncate(body)
                ),
                e,
            )
        }),
        400..=499 => Err(ClientError::http_status(
            status,
            format!("Request failed ({}): {}", status, error_detail(body)),
        )),
        _ => Err(ClientError::http_status(
            status,
            format!(
                "Server error ({}); contact support with request id {}",
                status, request_id
            ),
        )),
    }
}

/// Pulls a human-readable message out of an error body
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let structured = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .or_else(|| {
                value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
            });
        if let Some(message) = structured {
            return message.to_string();
        }
    }
    truncate(body)
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// The platform wraps payloads in a `response` field
fn unwrap_envelope(value: &Value) -> &Value {
    value.get("response").unwrap_or(value)
}

/// Extracts the job id from an upload acknowledgement
pub fn parse_upload_ack(value: Value) -> ClientResult<UploadAck> {
    let body = unwrap_envelope(&value);
    let job_id = match body.get("job_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ClientError::transport(
                "Malformed response: upload acknowledgement has no job_id",
            ))
        }
    };
    let initial_status = body
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(UploadAck {
        job_id,
        initial_status,
        raw_response: value,
    })
}

/// Splits a status response into the raw status string and the remaining metadata
pub fn parse_status_reply(value: Value) -> ClientResult<StatusReply> {
    let body = unwrap_envelope(&value);
    let Some(object) = body.as_object() else {
        return Err(ClientError::transport(
            "Malformed response: job status is not an object",
        ));
    };
    let raw_status = object
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::transport("Malformed response: job status missing"))?
        .to_string();

    let metadata: Metadata = object
        .iter()
        .filter(|(key, _)| key.as_str() != "status")
        .map(|(key, v)| (key.clone(), v.clone()))
        .collect();

    Ok(StatusReply {
        raw_status,
        metadata,
        raw_response: value,
    })
}

/// Extracts the signed upload URL
pub fn parse_signed_url(value: &Value) -> ClientResult<String> {
    let body = unwrap_envelope(value);
    body.as_str()
        .or_else(|| body.get("url").and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::transport("Malformed response: no upload URL returned"))
}
