//! Labellerr SDK Core Type Definitions
//!
//! Fundamental identifiers, constants and enumerations shared across modules.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Project identifier (server-assigned)
pub type ProjectId = String;

/// Client (workspace) identifier
pub type ClientId = String;

/// Server-side job identifier (opaque)
pub type JobId = String;

/// Free-form key/value metadata reported by the platform
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Generates a request tracking id
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Platform Constants
// =============================================================================

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.labellerr.com";

/// Origin header value expected by the platform
pub const DEFAULT_ORIGIN: &str = "https://pro.labellerr.com";

/// Value of the `source` header identifying this client
pub const SOURCE_HEADER_VALUE: &str = "sdk";

// =============================================================================
// Annotation Format
// =============================================================================

/// Supported pre-annotation formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationFormat {
    Json,
    CocoJson,
    Csv,
    Png,
}

impl AnnotationFormat {
    pub const ALL: [AnnotationFormat; 4] = [
        AnnotationFormat::Json,
        AnnotationFormat::CocoJson,
        AnnotationFormat::Csv,
        AnnotationFormat::Png,
    ];

    /// Value sent as `answer_format`
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationFormat::Json => "json",
            AnnotationFormat::CocoJson => "coco_json",
            AnnotationFormat::Csv => "csv",
            AnnotationFormat::Png => "png",
        }
    }

    /// File extension the annotation file must carry, if the format pins one
    pub fn required_extension(&self) -> Option<&'static str> {
        match self {
            AnnotationFormat::CocoJson => Some("json"),
            _ => None,
        }
    }

    /// Comma-separated list of accepted names, for error messages
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for AnnotationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnnotationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "coco_json" | "coco" => Ok(Self::CocoJson),
            "csv" => Ok(Self::Csv),
            "png" => Ok(Self::Png),
            other => Err(format!(
                "Unsupported annotation format '{}'. Must be one of: {}",
                other,
                Self::supported_list()
            )),
        }
    }
}

// =============================================================================
// Confidence Bucket
// =============================================================================

/// Confidence bucket assigned to uploaded pre-annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBucket {
    Low,
    Medium,
    High,
}

impl ConfidenceBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBucket::Low => "low",
            ConfidenceBucket::Medium => "medium",
            ConfidenceBucket::High => "high",
        }
    }
}

impl std::str::FromStr for ConfidenceBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!(
                "Invalid confidence bucket '{}'. Must be one of: low, medium, high",
                other
            )),
        }
    }
}
