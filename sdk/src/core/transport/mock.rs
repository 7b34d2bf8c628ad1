//! Mock Transport
//!
//! Scripted in-memory transport for tests. Replays queued upload acknowledgements,
//! status replies and API responses, and counts every call per endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ApiRequest, StatusReply, Transport, UploadAck};
use crate::core::jobs::JobHandle;
use crate::core::upload::{UploadTarget, ValidatedUpload};
use crate::core::{ClientError, ClientResult};

#[derive(Debug, Default)]
struct Script {
    upload_acks: VecDeque<ClientResult<UploadAck>>,
    statuses: VecDeque<ClientResult<StatusReply>>,
    /// Replayed once the status queue runs dry
    last_status: Option<StatusReply>,
    responses: VecDeque<ClientResult<Value>>,
    requests: Vec<ApiRequest>,
    uploads: Vec<(UploadTarget, String)>,
}

/// Mock transport for testing
#[derive(Debug)]
pub struct MockTransport {
    job_id: String,
    latency: Option<Duration>,
    script: Mutex<Script>,
    upload_calls: AtomicUsize,
    status_calls: AtomicUsize,
    request_calls: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a mock that acknowledges uploads as `mock-job` and reports `processing`
    pub fn new() -> Self {
        Self {
            job_id: "mock-job".to_string(),
            latency: None,
            script: Mutex::new(Script::default()),
            upload_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    /// Delay applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queues raw status strings, replayed in order
    pub fn with_statuses<'a>(self, statuses: impl IntoIterator<Item = &'a str>) -> Self {
        for raw in statuses {
            self.push_status(raw);
        }
        self
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_status(&self, raw_status: &str) {
        self.push_status_reply(StatusReply::new(raw_status));
    }

    pub fn push_status_reply(&self, reply: StatusReply) {
        self.script().statuses.push_back(Ok(reply));
    }

    pub fn push_status_error(&self, error: ClientError) {
        self.script().statuses.push_back(Err(error));
    }

    pub fn push_upload_ack(&self, ack: UploadAck) {
        self.script().upload_acks.push_back(Ok(ack));
    }

    pub fn fail_next_upload(&self, error: ClientError) {
        self.script().upload_acks.push_back(Err(error));
    }

    pub fn push_response(&self, value: Value) {
        self.script().responses.push_back(Ok(value));
    }

    pub fn push_request_error(&self, error: ClientError) {
        self.script().responses.push_back(Err(error));
    }

    /// Generic requests received so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.script().requests.clone()
    }

    /// `(target, storage path)` of every upload received so far
    pub fn uploads(&self) -> Vec<(UploadTarget, String)> {
        self.script().uploads.clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn request_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.upload_calls() + self.status_calls() + self.request_calls()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload_annotations(
        &self,
        upload: &ValidatedUpload,
        target: &UploadTarget,
    ) -> ClientResult<UploadAck> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut script = self.script();
        script
            .uploads
            .push((target.clone(), upload.storage_path(target)));
        script.upload_acks.pop_front().unwrap_or_else(|| {
            Ok(UploadAck {
                job_id: self.job_id.clone(),
                initial_status: Some("queued".to_string()),
                raw_response: json!({"response": {"job_id": self.job_id}}),
            })
        })
    }

    async fn job_status(&self, _job: &JobHandle) -> ClientResult<StatusReply> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut script = self.script();
        match script.statuses.pop_front() {
            Some(Ok(mut reply)) => {
                if reply.raw_response.is_null() {
                    let mut body = reply.metadata.clone();
                    body.insert("status".to_string(), json!(reply.raw_status));
                    reply.raw_response = json!({ "response": body });
                }
                script.last_status = Some(reply.clone());
                Ok(reply)
            }
            Some(Err(e)) => Err(e),
            None => Ok(script
                .last_status
                .clone()
                .unwrap_or_else(|| StatusReply::new("processing"))),
        }
    }

    async fn request(&self, request: ApiRequest) -> ClientResult<Value> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut script = self.script();
        script.requests.push(request);
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "response": {} })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobHandle {
        JobHandle::new("job-1", "p", "c")
    }

    #[tokio::test]
    async fn test_replays_statuses_then_repeats_last() {
        let transport = MockTransport::new().with_statuses(["queued", "processing"]);

        assert_eq!(transport.job_status(&job()).await.unwrap().raw_status, "queued");
        assert_eq!(transport.job_status(&job()).await.unwrap().raw_status, "processing");
        assert_eq!(transport.job_status(&job()).await.unwrap().raw_status, "processing");
        assert_eq!(transport.status_calls(), 3);
    }

    #[tokio::test]
    async fn test_default_status_is_processing() {
        let transport = MockTransport::new();
        let reply = transport.job_status(&job()).await.unwrap();
        assert_eq!(reply.raw_status, "processing");
    }

    #[tokio::test]
    async fn test_scripted_errors_and_raw_response() {
        let transport = MockTransport::new();
        transport.push_status_error(ClientError::transport("blip"));
        transport.push_status("completed");

        assert!(transport.job_status(&job()).await.is_err());
        let reply = transport.job_status(&job()).await.unwrap();
        assert_eq!(reply.raw_response["response"]["status"], json!("completed"));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let transport = MockTransport::new();
        transport.push_response(json!({"response": {"project_id": "p-1"}}));

        let value = transport
            .request(ApiRequest::get("/projects").with_client_id("c"))
            .await
            .unwrap();
        assert_eq!(value["response"]["project_id"], json!("p-1"));
        assert_eq!(transport.requests()[0].path, "/projects");
        assert_eq!(transport.total_calls(), 1);
    }
}
