//! CLI-specific error types
//!
//! Every CLI error ends the process with status 1.

use std::fmt;
use std::io;

use crate::errors::HarnessError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file or override error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// The async runtime or controller could not be set up
    SetupFailed,
    /// A scenario finished with a FAIL verdict
    VerdictFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "FAULTLINE_CLI_CONFIG_ERROR",
            Self::IoError => "FAULTLINE_CLI_IO_ERROR",
            Self::SetupFailed => "FAULTLINE_CLI_SETUP_FAILED",
            Self::VerdictFailed => "FAULTLINE_CLI_VERDICT_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Setup failed
    pub fn setup_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::SetupFailed, msg)
    }

    /// Scenario failed
    pub fn verdict_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::VerdictFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<HarnessError> for CliError {
    fn from(e: HarnessError) -> Self {
        match e {
            HarnessError::Config(msg) => Self::config_error(msg),
            other => Self::setup_failed(format!("{}: {}", other.code(), other)),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::verdict_failed("crash cycle 2 failed");
        assert_eq!(
            err.to_string(),
            "FAULTLINE_CLI_VERDICT_FAILED: crash cycle 2 failed"
        );
    }

    #[test]
    fn test_harness_config_error_maps_to_config() {
        let err: CliError = HarnessError::Config("startup_retries must be > 0".into()).into();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert_eq!(err.message(), "startup_retries must be > 0");

        let err: CliError = HarnessError::transient("/kv/x", "refused").into();
        assert_eq!(err.code_str(), "FAULTLINE_CLI_SETUP_FAILED");
    }
}
