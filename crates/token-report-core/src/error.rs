//! Error types for token-report-core
//!
//! Every failure in the fetch pipeline is fatal for the run; the variants exist
//! so callers can tell the operator *which* step failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for token-report operations
#[derive(Error, Debug)]
pub enum ReportError {
    // ===================
    // Config Errors
    // ===================
    #[error("{message}")]
    Configuration { message: String },

    #[error("Invalid base URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    // ===================
    // Auth Errors
    // ===================
    #[error("Login failed: {message}")]
    Authentication { message: String },

    // ===================
    // HTTP Errors
    // ===================
    #[error("Request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ===================
    // IO Errors
    // ===================
    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ReportError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// True for failures the operator can fix by editing credentials
    pub fn is_credentials_problem(&self) -> bool {
        matches!(
            self,
            ReportError::Configuration { .. } | ReportError::Authentication { .. }
        )
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_message_is_prefixed() {
        let err = ReportError::authentication("HTTP 401: bad password");
        assert_eq!(err.to_string(), "Login failed: HTTP 401: bad password");
    }

    #[test]
    fn test_http_error_display() {
        let err = ReportError::Http {
            status: 503,
            body: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn test_credentials_problem_classification() {
        assert!(ReportError::configuration("Email is required").is_credentials_problem());
        assert!(ReportError::authentication("no token").is_credentials_problem());
        assert!(!ReportError::Http {
            status: 500,
            body: String::new()
        }
        .is_credentials_problem());
    }
}
