//! Client Configuration
//!
//! Credentials, endpoint, poll budget and instrumentation settings.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - JSON file (`{config_dir}/labellerr/config.json` by default)
//! - `LABELLERR_*` environment variables
//! - per-call `PollOptions`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{ClientError, ClientResult, DEFAULT_BASE_URL, DEFAULT_ORIGIN};

/// Config file name
pub const CONFIG_FILE: &str = "config.json";

/// Directory under the platform config dir
pub const CONFIG_DIR: &str = "labellerr";

pub const ENV_API_KEY: &str = "LABELLERR_API_KEY";
pub const ENV_API_SECRET: &str = "LABELLERR_API_SECRET";
pub const ENV_CLIENT_ID: &str = "LABELLERR_CLIENT_ID";
pub const ENV_BASE_URL: &str = "LABELLERR_BASE_URL";
pub const ENV_POLL_TIMEOUT_SECS: &str = "LABELLERR_POLL_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "LABELLERR_POLL_INTERVAL_MS";

// =============================================================================
// Backoff Kind
// =============================================================================

/// Poll interval growth policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same interval between every poll
    #[default]
    Constant,
    /// Interval grows by the base interval each poll, up to the cap
    Linear,
    /// Interval doubles each poll, up to the cap
    Exponential,
}

// =============================================================================
// Instrumentation Config
// =============================================================================

/// Logging behaviour of the instrumented client surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationConfig {
    /// Render operation arguments into the entry log
    #[serde(default)]
    pub log_arguments: bool,

    /// Parameter names always redacted, on top of the built-in secret names
    #[serde(default)]
    pub redacted_params: Vec<String>,

    /// Operations logged without their arguments
    #[serde(default)]
    pub quiet_operations: Vec<String>,

    /// Operations that bypass logging and classification entirely
    #[serde(default = "default_excluded_operations")]
    pub excluded_operations: Vec<String>,
}

fn default_excluded_operations() -> Vec<String> {
    vec!["close".to_string()]
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            log_arguments: false,
            redacted_params: Vec::new(),
            quiet_operations: Vec::new(),
            excluded_operations: default_excluded_operations(),
        }
    }
}

impl InstrumentationConfig {
    fn normalize(&mut self) {
        for list in [
            &mut self.redacted_params,
            &mut self.quiet_operations,
            &mut self.excluded_operations,
        ] {
            *list = list
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            list.sort();
            list.dedup();
        }
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Client configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Default client id for collaborator calls
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as the `origin` header
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Per HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Poller's own budget
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Base poll interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Cap for linear/exponential backoff
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// Extra attempts for one status check after a transient failure
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,

    #[serde(default = "default_transient_retry_delay_ms")]
    pub transient_retry_delay_ms: u64,

    /// Concurrent background poll loops
    #[serde(default = "default_max_background_jobs")]
    pub max_background_jobs: usize,

    #[serde(default)]
    pub instrumentation: InstrumentationConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_poll_timeout_secs() -> u64 {
    1800
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_max_poll_interval_ms() -> u64 {
    60_000
}

fn default_transient_retries() -> u32 {
    3
}

fn default_transient_retry_delay_ms() -> u64 {
    500
}

fn default_max_background_jobs() -> usize {
    16
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            client_id: None,
            base_url: default_base_url(),
            origin: default_origin(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            backoff: BackoffKind::default(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            transient_retries: default_transient_retries(),
            transient_retry_delay_ms: default_transient_retry_delay_ms(),
            max_background_jobs: default_max_background_jobs(),
            instrumentation: InstrumentationConfig::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("client_id", &self.client_id)
            .field("base_url", &self.base_url)
            .field("origin", &self.origin)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("backoff", &self.backoff)
            .field("max_poll_interval_ms", &self.max_poll_interval_ms)
            .field("transient_retries", &self.transient_retries)
            .field("transient_retry_delay_ms", &self.transient_retry_delay_ms)
            .field("max_background_jobs", &self.max_background_jobs)
            .field("instrumentation", &self.instrumentation)
            .finish()
    }
}

/// Masks a credential for display, keeping only its last four characters
pub fn redact(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

impl ClientConfig {
    /// Config with the given credentials and defaults elsewhere
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads config from a JSON file, returning defaults if it doesn't exist
    pub fn load(path: &Path) -> ClientResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let mut config: ClientConfig = serde_json::from_str(&content).map_err(|e| {
            ClientError::validation(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.normalize();
        debug!(path = %path.display(), "Loaded client config");
        Ok(config)
    }

    /// Defaults overlaid with the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlays `LABELLERR_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = v;
        }
        if let Some(v) = get(ENV_API_SECRET) {
            self.api_secret = v;
        }
        if let Some(v) = get(ENV_CLIENT_ID) {
            self.client_id = Some(v);
        }
        if let Some(v) = get(ENV_BASE_URL) {
            self.base_url = v;
        }
        if let Some(v) = get(ENV_POLL_TIMEOUT_SECS).and_then(|v| v.trim().parse().ok()) {
            self.poll_timeout_secs = v;
        }
        if let Some(v) = get(ENV_POLL_INTERVAL_MS).and_then(|v| v.trim().parse().ok()) {
            self.poll_interval_ms = v;
        }
        self.normalize();
    }

    /// Normalizes and clamps values so the config is always usable
    pub fn normalize(&mut self) {
        self.api_key = self.api_key.trim().to_string();
        self.api_secret = self.api_secret.trim().to_string();
        self.client_id = self
            .client_id
            .take()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let base_url = self.base_url.trim().trim_end_matches('/');
        self.base_url = if base_url.is_empty() {
            default_base_url()
        } else {
            base_url.to_string()
        };
        if self.origin.trim().is_empty() {
            self.origin = default_origin();
        }

        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 3600);
        self.poll_timeout_secs = self.poll_timeout_secs.clamp(1, 86_400);
        self.poll_interval_ms = self.poll_interval_ms.clamp(10, 600_000);
        self.max_poll_interval_ms = self.max_poll_interval_ms.max(self.poll_interval_ms);
        self.transient_retries = self.transient_retries.min(10);
        self.transient_retry_delay_ms = self.transient_retry_delay_ms.min(60_000);
        self.max_background_jobs = self.max_background_jobs.clamp(1, 256);

        self.instrumentation.normalize();
    }

    /// Checks everything a client needs before talking to the platform
    pub fn validate(&self) -> ClientResult<()> {
        if self.api_key.trim().is_empty() || self.api_secret.trim().is_empty() {
            return Err(ClientError::validation(format!(
                "API key and secret are required (set {} and {})",
                ENV_API_KEY, ENV_API_SECRET
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::validation(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    pub fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_timeout(), Duration::from_secs(1800));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.backoff, BackoffKind::Constant);
        assert_eq!(config.transient_retries, 3);
        assert!(!config.instrumentation.log_arguments);
        assert_eq!(config.instrumentation.excluded_operations, vec!["close"]);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"apiKey":"k","pollIntervalMs":1000,"backoff":"exponential"}"#)
                .unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.backoff, BackoffKind::Exponential);
        assert_eq!(config.poll_timeout_secs, 1800);
        assert_eq!(config.instrumentation.excluded_operations, vec!["close"]);
    }

    #[test]
    fn test_normalize_clamps_values() {
        let mut config = ClientConfig {
            base_url: " https://example.test/api/ ".to_string(),
            poll_interval_ms: 0,
            poll_timeout_secs: 0,
            max_poll_interval_ms: 1,
            transient_retries: 99,
            max_background_jobs: 0,
            client_id: Some("  ".to_string()),
            ..ClientConfig::default()
        };
        config.normalize();

        assert_eq!(config.base_url, "https://example.test/api");
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.poll_timeout_secs, 1);
        assert_eq!(config.max_poll_interval_ms, 10);
        assert_eq!(config.transient_retries, 10);
        assert_eq!(config.max_background_jobs, 1);
        assert_eq!(config.client_id, None);
    }

    #[test]
    fn test_validate_requires_credentials() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Validation);

        assert!(ClientConfig::new("key", "secret").validate().is_ok());

        let bad_url = ClientConfig::new("key", "secret").with_base_url("ftp://nope");
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = ClientConfig::new("abcdefghijkl1234", "super-secret-value-9999");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("abcdefghijkl1234"));
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("****1234"));
        assert!(rendered.contains("****9999"));
    }

    #[test]
    fn test_redact_short_values() {
        assert_eq!(redact(""), "");
        assert_eq!(redact("short"), "****");
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, "env-key"),
            (ENV_CLIENT_ID, "client-7"),
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_POLL_TIMEOUT_SECS, "not-a-number"),
            (ENV_API_SECRET, "   "),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::new("file-key", "file-secret");
        config.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.api_secret, "file-secret");
        assert_eq!(config.client_id.as_deref(), Some("client-7"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.poll_timeout_secs, 1800);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ClientConfig::load(&temp.path().join("missing.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_file_normalizes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"apiKey":"k","apiSecret":"s","baseUrl":"https://x.test/","instrumentation":{"excludedOperations":[" Close ","close"]}}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://x.test");
        assert_eq!(config.instrumentation.excluded_operations, vec!["close"]);
    }

    #[test]
    fn test_load_invalid_file_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Validation);
    }
}
