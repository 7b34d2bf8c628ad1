//! HTTP Transport
//!
//! reqwest-backed access to the Labellerr REST API. Clones share one connection pool.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{
    decode_response, parse_signed_url, parse_status_reply, parse_upload_ack, ApiRequest,
    HttpMethod, StatusReply, Transport, UploadAck,
};
use crate::core::config::ClientConfig;
use crate::core::jobs::JobHandle;
use crate::core::upload::{UploadTarget, ValidatedUpload};
use crate::core::{new_request_id, ClientError, ClientResult, SOURCE_HEADER_VALUE};

/// Content type for the raw payload PUT to the signed URL
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload purpose understood by the signed-URL endpoint
const PRE_ANNOTATION_PURPOSE: &str = "pre-annotations";

/// HTTP transport for the Labellerr API
#[derive(Clone)]
pub struct HttpTransport {
    /// HTTP client with configured timeout
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
    origin: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport from the client config
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ClientError::internal_with_cause(format!("Failed to create HTTP client: {}", e), e)
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            origin: config.origin.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the authentication and tracking headers every API call carries
    fn authed(
        &self,
        builder: reqwest::RequestBuilder,
        client_id: Option<&str>,
        request_id: &str,
    ) -> reqwest::RequestBuilder {
        let builder = builder
            .header("api_key", &self.api_key)
            .header("api_secret", &self.api_secret)
            .header("source", SOURCE_HEADER_VALUE)
            .header("origin", &self.origin)
            .query(&[("uuid", request_id)]);
        match client_id {
            Some(id) => builder.header("client_id", id),
            None => builder,
        }
    }

    /// Sends a request and decodes the JSON body
    async fn send(&self, builder: reqwest::RequestBuilder, request_id: &str) -> ClientResult<Value> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_response(status, &body, request_id)
    }

    async fn signed_upload_url(&self, storage_path: &str, client_id: &str) -> ClientResult<String> {
        let request_id = new_request_id();
        let builder = self
            .client
            .get(self.url("/connectors/direct-upload-url"))
            .query(&[
                ("client_id", client_id),
                ("purpose", PRE_ANNOTATION_PURPOSE),
                ("file_name", storage_path),
            ]);
        let value = self
            .send(self.authed(builder, Some(client_id), &request_id), &request_id)
            .await?;
        parse_signed_url(&value)
    }

    /// PUTs the payload to storage. The signed URL carries its own auth.
    async fn put_payload(&self, url: &str, data: Vec<u8>) -> ClientResult<()> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, UPLOAD_CONTENT_TYPE)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let detail: String = body.chars().take(200).collect();
        Err(ClientError::http_status(
            status.as_u16(),
            format!("Payload upload failed ({}): {}", status, detail),
        ))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload_annotations(
        &self,
        upload: &ValidatedUpload,
        target: &UploadTarget,
    ) -> ClientResult<UploadAck> {
        let storage_path = upload.storage_path(target);

        let signed_url = self
            .signed_upload_url(&storage_path, &target.client_id)
            .await?;
        let data = upload.source.read().await?;
        debug!(path = %storage_path, bytes = data.len(), "Uploading annotation payload");
        self.put_payload(&signed_url, data).await?;

        let request_id = new_request_id();
        let mut query: Vec<(&str, &str)> = vec![
            ("project_id", target.project_id.as_str()),
            ("answer_format", upload.format.as_str()),
            ("client_id", target.client_id.as_str()),
            ("gcs_path", storage_path.as_str()),
        ];
        if let Some(bucket) = upload.confidence {
            query.push(("conf_bucket", bucket.as_str()));
        }

        let builder = self
            .client
            .post(self.url("/actions/upload_answers"))
            .query(&query)
            .header("email_id", &self.api_key);
        let value = self
            .send(
                self.authed(builder, Some(&target.client_id), &request_id),
                &request_id,
            )
            .await?;

        parse_upload_ack(value)
    }

    async fn job_status(&self, job: &JobHandle) -> ClientResult<StatusReply> {
        let request_id = new_request_id();
        let builder = self
            .client
            .get(self.url("/actions/upload_answers_status"))
            .query(&[
                ("project_id", job.project_id.as_str()),
                ("job_id", job.job_id.as_str()),
                ("client_id", job.client_id.as_str()),
            ]);
        let value = self
            .send(
                self.authed(builder, Some(&job.client_id), &request_id),
                &request_id,
            )
            .await?;

        parse_status_reply(value)
    }

    async fn request(&self, request: ApiRequest) -> ClientResult<Value> {
        let request_id = new_request_id();
        let url = self.url(&request.path);
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        let builder = builder.query(&request.query);
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        debug!(method = ?request.method, path = %request.path, "Sending API request");
        self.send(
            self.authed(builder, request.client_id.as_deref(), &request_id),
            &request_id,
        )
        .await
    }
}
