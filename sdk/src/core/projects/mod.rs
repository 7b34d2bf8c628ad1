//! Project, Dataset & Export Operations
//!
//! Thin request builders around the platform's project, dataset and export
//! endpoints. Each operation checks its local preconditions before any network
//! I/O and extracts only the identifiers callers need from the response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::core::transport::{ApiRequest, Transport};
use crate::core::{ClientError, ClientResult, ProjectId};

// =============================================================================
// Enumerations
// =============================================================================

/// Kind of data a project or dataset holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Image,
    Video,
    Audio,
    Document,
    Text,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Image => "image",
            DataType::Video => "video",
            DataType::Audio => "audio",
            DataType::Document => "document",
            DataType::Text => "text",
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "document" => Ok(Self::Document),
            "text" => Ok(Self::Text),
            other => Err(format!(
                "Invalid data type '{}'. Must be one of: image, video, audio, document, text",
                other
            )),
        }
    }
}

/// Visibility scope for dataset listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatasetScope {
    Project,
    #[default]
    Client,
    Public,
}

impl DatasetScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetScope::Project => "project",
            DatasetScope::Client => "client",
            DatasetScope::Public => "public",
        }
    }
}

impl std::str::FromStr for DatasetScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "client" => Ok(Self::Client),
            "public" => Ok(Self::Public),
            other => Err(format!(
                "Invalid dataset scope '{}'. Must be one of: project, client, public",
                other
            )),
        }
    }
}

/// Formats a local export can be produced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    CocoJson,
    Csv,
    Png,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "coco_json" | "coco" => Ok(Self::CocoJson),
            "csv" => Ok(Self::Csv),
            "png" => Ok(Self::Png),
            other => Err(format!(
                "Invalid export format '{}'. Must be one of: json, coco_json, csv, png",
                other
            )),
        }
    }
}

/// Review stage of the files included in an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Review,
    RAssigned,
    ClientReview,
    CrAssigned,
    Accepted,
}

impl std::str::FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "review" => Ok(Self::Review),
            "r_assigned" => Ok(Self::RAssigned),
            "client_review" => Ok(Self::ClientReview),
            "cr_assigned" => Ok(Self::CrAssigned),
            "accepted" => Ok(Self::Accepted),
            other => Err(format!(
                "Invalid export status '{}'. Must be one of: review, r_assigned, client_review, cr_assigned, accepted",
                other
            )),
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Annotation/review rotation counts for a new project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    pub annotation_rotation_count: u32,
    pub review_rotation_count: u32,
    pub client_review_rotation_count: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            annotation_rotation_count: 1,
            review_rotation_count: 1,
            client_review_rotation_count: 0,
        }
    }
}

impl RotationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.review_rotation_count != 1 {
            return Err("review_rotation_count must be 1".to_string());
        }
        let client_review = self.client_review_rotation_count;
        match self.annotation_rotation_count {
            0 if client_review != 0 => Err(
                "client_review_rotation_count must be 0 when annotation_rotation_count is 0"
                    .to_string(),
            ),
            1 if client_review > 1 => Err(
                "client_review_rotation_count can only be 0 or 1 when annotation_rotation_count is 1"
                    .to_string(),
            ),
            n if n > 1 && client_review != 0 => Err(
                "client_review_rotation_count must be 0 when annotation_rotation_count is greater than 1"
                    .to_string(),
            ),
            _ => Ok(()),
        }
    }
}

/// Parameters for creating a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub project_name: String,
    pub data_type: DataType,
    pub client_id: String,
    pub attached_datasets: Vec<String>,
    pub annotation_template_id: String,
    #[serde(default)]
    pub rotations: RotationConfig,
    #[serde(default)]
    pub use_ai: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl ProjectSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.project_name.trim().is_empty() {
            return Err("project_name is required".to_string());
        }
        if self.client_id.trim().is_empty() {
            return Err("client_id is required".to_string());
        }
        if self.attached_datasets.is_empty()
            || self.attached_datasets.iter().any(|d| d.trim().is_empty())
        {
            return Err("at least one non-empty dataset id is required".to_string());
        }
        if self.annotation_template_id.trim().is_empty() {
            return Err("annotation_template_id is required".to_string());
        }
        self.rotations.validate()
    }
}

/// Dataset listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetQuery {
    pub client_id: String,
    pub data_type: DataType,
    pub project_id: String,
    pub scope: DatasetScope,
}

impl DatasetQuery {
    pub fn new(
        client_id: impl Into<String>,
        data_type: DataType,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            data_type,
            project_id: project_id.into(),
            scope: DatasetScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: DatasetScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Parameters for a local export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub export_name: String,
    pub export_description: String,
    pub export_format: ExportFormat,
    pub statuses: Vec<ExportStatus>,
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.export_name.trim().is_empty() {
            return Err("export_name is required".to_string());
        }
        if self.statuses.is_empty() {
            return Err("at least one export status is required".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCreated {
    pub project_id: ProjectId,
    pub raw_response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetListing {
    pub linked: Vec<Value>,
    pub unlinked: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportCreated {
    pub export_id: String,
    pub raw_response: Value,
}

/// `export_status` the platform reports once an export file has been written
pub const EXPORT_READY_STATUS: &str = "Created";

/// Progress of one export as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    pub report_id: String,
    pub is_completed: bool,
    pub export_status: Option<String>,
    /// Download details, fetched once the export is ready
    pub download: Option<ExportDownload>,
}

impl ExportProgress {
    pub fn is_ready(&self) -> bool {
        self.is_completed && self.export_status.as_deref() == Some(EXPORT_READY_STATUS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportStatusReport {
    pub exports: Vec<ExportProgress>,
    pub raw_response: Value,
}

impl ExportStatusReport {
    /// True when every requested export is ready to download
    pub fn all_ready(&self) -> bool {
        !self.exports.is_empty() && self.exports.iter().all(ExportProgress::is_ready)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDownload {
    pub export_id: String,
    pub url: Option<String>,
    pub raw_response: Value,
}

fn envelope(value: &Value) -> &Value {
    value.get("response").unwrap_or(value)
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    let body = envelope(value);
    keys.iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn require_id(name: &str, value: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(format!("{} is required", name)));
    }
    Ok(())
}

// =============================================================================
// Projects API
// =============================================================================

/// Project, dataset and export calls over the shared transport
#[derive(Clone)]
pub struct ProjectsApi {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ProjectsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectsApi")
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl ProjectsApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn create_project(&self, spec: &ProjectSpec) -> ClientResult<ProjectCreated> {
        spec.validate().map_err(ClientError::validation)?;

        let body = serde_json::to_value(spec)
            .map_err(|e| ClientError::internal_with_cause("Failed to encode project", e))?;
        let request = ApiRequest::post("/projects/create", body)
            .with_client_id(spec.client_id.trim())
            .with_query("client_id", spec.client_id.trim());

        let value = self.transport.request(request).await?;
        let project_id = string_field(&value, &["project_id"]).ok_or_else(|| {
            ClientError::transport("Malformed response: project creation returned no project_id")
        })?;

        info!(project_id = %project_id, "Project created");
        Ok(ProjectCreated {
            project_id,
            raw_response: value,
        })
    }

    pub async fn list_projects(&self, client_id: &str) -> ClientResult<Vec<Value>> {
        require_id("client_id", client_id)?;

        let request = ApiRequest::get("/project_drafts/projects/detailed_list")
            .with_client_id(client_id.trim())
            .with_query("client_id", client_id.trim());
        let value = self.transport.request(request).await?;

        match envelope(&value) {
            Value::Array(items) => Ok(items.clone()),
            Value::Object(map) => Ok(map
                .get("projects")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()),
            _ => Err(ClientError::transport(
                "Malformed response: project listing is not a list",
            )),
        }
    }

    pub async fn list_datasets(&self, query: &DatasetQuery) -> ClientResult<DatasetListing> {
        require_id("client_id", &query.client_id)?;
        require_id("project_id", &query.project_id)?;

        let request = ApiRequest::get("/datasets/list")
            .with_client_id(query.client_id.trim())
            .with_query("client_id", query.client_id.trim())
            .with_query("data_type", query.data_type.as_str())
            .with_query("permission_level", query.scope.as_str())
            .with_query("project_id", query.project_id.trim());
        let value = self.transport.request(request).await?;

        let body = envelope(&value);
        if !body.is_object() {
            return Err(ClientError::transport(
                "Malformed response: dataset listing is not an object",
            ));
        }
        let collection = |name: &str| {
            body.get(name)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        Ok(DatasetListing {
            linked: collection("linked"),
            unlinked: collection("unlinked"),
        })
    }

    pub async fn create_local_export(
        &self,
        project_id: &str,
        client_id: &str,
        export: &ExportConfig,
    ) -> ClientResult<ExportCreated> {
        require_id("project_id", project_id)?;
        require_id("client_id", client_id)?;
        export.validate().map_err(ClientError::validation)?;

        let mut body = serde_json::to_value(export)
            .map_err(|e| ClientError::internal_with_cause("Failed to encode export config", e))?;
        if let Some(map) = body.as_object_mut() {
            map.insert("export_destination".to_string(), json!("local"));
            map.insert("question_ids".to_string(), json!(["all"]));
        }

        let request = ApiRequest::post("/sdk/export/files", body)
            .with_client_id(client_id.trim())
            .with_query("project_id", project_id.trim())
            .with_query("client_id", client_id.trim());
        let value = self.transport.request(request).await?;

        let export_id = string_field(&value, &["export_id", "report_id"]).ok_or_else(|| {
            ClientError::transport("Malformed response: export creation returned no export_id")
        })?;

        info!(export_id = %export_id, project_id = %project_id, "Local export created");
        Ok(ExportCreated {
            export_id,
            raw_response: value,
        })
    }

    /// Reads the progress of previously created exports. Exports that are ready
    /// get their download details fetched in the same call.
    pub async fn check_export_status(
        &self,
        project_id: &str,
        report_ids: &[String],
        client_id: &str,
    ) -> ClientResult<ExportStatusReport> {
        require_id("project_id", project_id)?;
        require_id("client_id", client_id)?;
        if report_ids.is_empty() || report_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ClientError::validation(
                "report_ids must be a non-empty list of ids",
            ));
        }

        let request = ApiRequest::post("/exports/status", json!({ "report_ids": report_ids }))
            .with_client_id(client_id.trim())
            .with_query("project_id", project_id.trim())
            .with_query("client_id", client_id.trim());
        let value = self.transport.request(request).await?;

        let items = value
            .get("status")
            .or_else(|| envelope(&value).get("status"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut exports = Vec::with_capacity(items.len());
        for item in &items {
            let Some(report_id) = string_field(item, &["report_id", "export_id"]) else {
                continue;
            };
            let mut progress = ExportProgress {
                report_id,
                is_completed: item
                    .get("is_completed")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                export_status: string_field(item, &["export_status"]),
                download: None,
            };
            if progress.is_ready() {
                progress.download = Some(
                    self.fetch_download_url(project_id, &progress.report_id, client_id)
                        .await?,
                );
            }
            exports.push(progress);
        }

        debug!(
            project_id = %project_id,
            requested = report_ids.len(),
            ready = exports.iter().filter(|e| e.is_ready()).count(),
            "Checked export status"
        );
        Ok(ExportStatusReport {
            exports,
            raw_response: value,
        })
    }

    /// Fetches the download details of a finished export
    pub async fn fetch_download_url(
        &self,
        project_id: &str,
        export_id: &str,
        client_id: &str,
    ) -> ClientResult<ExportDownload> {
        require_id("project_id", project_id)?;
        require_id("export_id", export_id)?;
        require_id("client_id", client_id)?;

        let request = ApiRequest::get("/exports/download")
            .with_client_id(client_id.trim())
            .with_query("client_id", client_id.trim())
            .with_query("project_id", project_id.trim())
            .with_query("report_id", export_id.trim());
        let value = self.transport.request(request).await?;

        let body = envelope(&value).clone();
        Ok(ExportDownload {
            export_id: export_id.trim().to_string(),
            url: string_field(&body, &["url", "download_url", "signed_url"]),
            raw_response: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{HttpMethod, MockTransport};
    use crate::core::ErrorKind;

    fn api(transport: &Arc<MockTransport>) -> ProjectsApi {
        ProjectsApi::new(transport.clone())
    }

    fn project_spec() -> ProjectSpec {
        ProjectSpec {
            project_name: "Street signs".to_string(),
            data_type: DataType::Image,
            client_id: "client-1".to_string(),
            attached_datasets: vec!["ds-1".to_string()],
            annotation_template_id: "tmpl-1".to_string(),
            rotations: RotationConfig::default(),
            use_ai: false,
            created_by: None,
        }
    }

    fn export_config() -> ExportConfig {
        ExportConfig {
            export_name: "weekly".to_string(),
            export_description: "accepted files".to_string(),
            export_format: ExportFormat::CocoJson,
            statuses: vec![ExportStatus::Accepted, ExportStatus::Review],
        }
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_rotation_rules() {
        assert!(RotationConfig::default().validate().is_ok());

        let bad_review = RotationConfig {
            review_rotation_count: 2,
            ..RotationConfig::default()
        };
        assert!(bad_review.validate().is_err());

        let zero_with_client_review = RotationConfig {
            annotation_rotation_count: 0,
            review_rotation_count: 1,
            client_review_rotation_count: 1,
        };
        assert!(zero_with_client_review.validate().is_err());

        let many_with_client_review = RotationConfig {
            annotation_rotation_count: 3,
            review_rotation_count: 1,
            client_review_rotation_count: 1,
        };
        assert!(many_with_client_review.validate().is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Video".parse::<DataType>(), Ok(DataType::Video));
        assert!("hologram".parse::<DataType>().is_err());
        assert_eq!("coco".parse::<ExportFormat>(), Ok(ExportFormat::CocoJson));
        assert!("yolo".parse::<ExportFormat>().is_err());
        assert_eq!("r_assigned".parse::<ExportStatus>(), Ok(ExportStatus::RAssigned));
        assert!("done".parse::<ExportStatus>().is_err());
        assert_eq!("Public".parse::<DatasetScope>(), Ok(DatasetScope::Public));
        assert!("global".parse::<DatasetScope>().is_err());
    }

    #[tokio::test]
    async fn test_invalid_inputs_make_no_calls() {
        let transport = Arc::new(MockTransport::new());
        let api = api(&transport);

        let mut spec = project_spec();
        spec.attached_datasets.clear();
        let err = api.create_project(&spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(api.list_projects(" ").await.is_err());
        assert!(api
            .list_datasets(&DatasetQuery::new("c", DataType::Image, ""))
            .await
            .is_err());

        let mut export = export_config();
        export.statuses.clear();
        assert!(api.create_local_export("p", "c", &export).await.is_err());

        assert!(api.check_export_status("p", &[], "c").await.is_err());
        assert!(api
            .check_export_status("p", &[" ".to_string()], "c")
            .await
            .is_err());
        assert!(api.fetch_download_url("p", "", "c").await.is_err());

        assert_eq!(transport.total_calls(), 0);
    }

    // =========================================================================
    // Request / Response Tests
    // =========================================================================

    #[tokio::test]
    async fn test_create_project() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {"project_id": "proj-9"}}));

        let created = api(&transport).create_project(&project_spec()).await.unwrap();
        assert_eq!(created.project_id, "proj-9");

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "/projects/create");
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["attached_datasets"], json!(["ds-1"]));
        assert_eq!(body["data_type"], json!("image"));
        assert_eq!(body["rotations"]["review_rotation_count"], json!(1));
    }

    #[tokio::test]
    async fn test_create_project_without_id_is_transport_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {}}));

        let err = api(&transport).create_project(&project_spec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_list_projects() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": [{"project_id": "a"}, {"project_id": "b"}]}));

        let projects = api(&transport).list_projects("client-1").await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(
            transport.requests()[0].query_value("client_id"),
            Some("client-1")
        );
    }

    #[tokio::test]
    async fn test_list_datasets_returns_both_collections() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {
            "linked": [{"dataset_id": "d1"}],
            "unlinked": [{"dataset_id": "d2"}, {"dataset_id": "d3"}]
        }}));

        let query = DatasetQuery::new("client-1", DataType::Image, "proj-1")
            .with_scope(DatasetScope::Project);
        let listing = api(&transport).list_datasets(&query).await.unwrap();

        assert_eq!(listing.linked.len(), 1);
        assert_eq!(listing.unlinked.len(), 2);
        let request = &transport.requests()[0];
        assert_eq!(request.query_value("data_type"), Some("image"));
        assert_eq!(request.query_value("permission_level"), Some("project"));
    }

    #[tokio::test]
    async fn test_list_datasets_missing_collections_are_empty() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {"linked": [{"dataset_id": "d1"}]}}));

        let listing = api(&transport)
            .list_datasets(&DatasetQuery::new("c", DataType::Text, "p"))
            .await
            .unwrap();
        assert_eq!(listing.linked.len(), 1);
        assert!(listing.unlinked.is_empty());
    }

    #[tokio::test]
    async fn test_create_local_export() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {"report_id": "exp-3"}}));

        let created = api(&transport)
            .create_local_export("proj-1", "client-1", &export_config())
            .await
            .unwrap();
        assert_eq!(created.export_id, "exp-3");

        let request = &transport.requests()[0];
        assert_eq!(request.path, "/sdk/export/files");
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["export_destination"], json!("local"));
        assert_eq!(body["question_ids"], json!(["all"]));
        assert_eq!(body["export_format"], json!("coco_json"));
        assert_eq!(body["statuses"], json!(["accepted", "review"]));
    }

    // =========================================================================
    // Export Lifecycle Tests
    // =========================================================================

    #[tokio::test]
    async fn test_check_export_status_fetches_ready_downloads() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"status": [
            {"report_id": "exp-1", "is_completed": true, "export_status": "Created"},
            {"report_id": "exp-2", "is_completed": false, "export_status": "Pending"}
        ]}));
        transport.push_response(json!({"response": {"url": "https://files.test/exp-1.zip"}}));

        let ids = vec!["exp-1".to_string(), "exp-2".to_string()];
        let report = api(&transport)
            .check_export_status("proj-1", &ids, "client-1")
            .await
            .unwrap();

        assert_eq!(report.exports.len(), 2);
        assert!(report.exports[0].is_ready());
        assert!(!report.exports[1].is_ready());
        assert!(!report.all_ready());
        let download = report.exports[0].download.as_ref().unwrap();
        assert_eq!(download.url.as_deref(), Some("https://files.test/exp-1.zip"));
        assert!(report.exports[1].download.is_none());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, "/exports/status");
        assert_eq!(requests[0].body.as_ref().unwrap()["report_ids"], json!(ids));
        assert_eq!(requests[1].path, "/exports/download");
        assert_eq!(requests[1].query_value("report_id"), Some("exp-1"));
    }

    #[tokio::test]
    async fn test_completed_but_not_created_is_not_ready() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {"status": [
            {"report_id": "exp-1", "is_completed": true, "export_status": "Failed"}
        ]}}));

        let report = api(&transport)
            .check_export_status("proj-1", &["exp-1".to_string()], "client-1")
            .await
            .unwrap();

        assert!(!report.exports[0].is_ready());
        assert_eq!(transport.request_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_download_url_without_url_keeps_response() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(json!({"response": {"files": ["a.json"]}}));

        let download = api(&transport)
            .fetch_download_url("proj-1", "exp-9", "client-1")
            .await
            .unwrap();

        assert_eq!(download.export_id, "exp-9");
        assert!(download.url.is_none());
        assert_eq!(download.raw_response["files"], json!(["a.json"]));
    }
}
