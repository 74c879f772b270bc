//! Harness configuration
//!
//! JSON document; every field has a default so a missing file is the same
//! as `{}`. CLI flags override individual fields after loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Path to the service binary (default: "build/Release/l3svc")
    #[serde(default = "default_service_binary")]
    pub service_binary: PathBuf,

    /// Service base URL, without the `/kv` suffix (default: "http://127.0.0.1:8080")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Working directory for the child process (default: current directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Where captured service output is written (default: "./faultline-logs")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Per-request timeout (default: 500ms)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Health probes before giving up on startup (default: 20)
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,

    /// Delay between health probes (default: 250ms)
    #[serde(default = "default_startup_poll_interval_ms")]
    pub startup_poll_interval_ms: u64,

    /// Budget for a graceful stop before forcing (default: 5000ms)
    #[serde(default = "default_graceful_stop_timeout_ms")]
    pub graceful_stop_timeout_ms: u64,

    /// Metrics endpoint path (default: "/metrics")
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Health endpoint path (default: "/kv/health")
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Service state removed before a clean start, e.g. its WAL file.
    /// Relative paths resolve against `working_dir`. (default: none)
    #[serde(default)]
    pub state_files: Vec<PathBuf>,
}

fn default_service_binary() -> PathBuf {
    PathBuf::from("build/Release/l3svc")
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./faultline-logs")
}

fn default_request_timeout_ms() -> u64 {
    500
}

fn default_startup_retries() -> u32 {
    20
}

fn default_startup_poll_interval_ms() -> u64 {
    250
}

fn default_graceful_stop_timeout_ms() -> u64 {
    5000
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_health_path() -> String {
    "/kv/health".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            service_binary: default_service_binary(),
            base_url: default_base_url(),
            working_dir: None,
            log_dir: default_log_dir(),
            request_timeout_ms: default_request_timeout_ms(),
            startup_retries: default_startup_retries(),
            startup_poll_interval_ms: default_startup_poll_interval_ms(),
            graceful_stop_timeout_ms: default_graceful_stop_timeout_ms(),
            metrics_path: default_metrics_path(),
            health_path: default_health_path(),
            state_files: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file, or defaults when `path` does not exist
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> HarnessResult<Self> {
        let config: HarnessConfig = serde_json::from_str(content)
            .map_err(|e| HarnessError::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the harness cannot run with
    pub fn validate(&self) -> HarnessResult<()> {
        if self.service_binary.as_os_str().is_empty() {
            return Err(HarnessError::Config("service_binary must not be empty".into()));
        }
        if !self.base_url.starts_with("http://") {
            return Err(HarnessError::Config(format!(
                "base_url '{}' must start with http://",
                self.base_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(HarnessError::Config("request_timeout_ms must be > 0".into()));
        }
        if self.startup_retries == 0 {
            return Err(HarnessError::Config("startup_retries must be > 0".into()));
        }
        if !self.metrics_path.starts_with('/') || !self.health_path.starts_with('/') {
            return Err(HarnessError::Config(
                "metrics_path and health_path must start with '/'".into(),
            ));
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay between startup health probes
    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup_poll_interval_ms)
    }

    /// Graceful stop budget
    pub fn graceful_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_timeout_ms)
    }

    /// Base URL with any trailing slash removed
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.metrics_path, "/metrics");
    }

    #[test]
    fn test_empty_document_is_defaults() {
        let config = HarnessConfig::from_json("{}").unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.startup_retries, 20);
    }

    #[test]
    fn test_partial_document_overrides() {
        let config = HarnessConfig::from_json(
            r#"{"base_url": "http://localhost:9090/", "startup_retries": 5}"#,
        )
        .unwrap();
        assert_eq!(config.base(), "http://localhost:9090");
        assert_eq!(config.startup_retries, 5);
        assert_eq!(config.graceful_stop_timeout_ms, 5000);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = HarnessConfig::from_json(r#"{"request_timeout_ms": 0}"#).unwrap_err();
        assert_eq!(err.code(), "FAULTLINE_CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(HarnessConfig::from_json(r#"{"base_url": "localhost:8080"}"#).is_err());
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(HarnessConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.health_path, "/kv/health");
    }
}
