//! Cloudflare backend error types

use stackflow_cloud::{ControlPlaneError, ErrorClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudflareError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Cloudflare API error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CloudflareError {
    /// Retry classification of the failure
    pub fn class(&self) -> ErrorClass {
        match self {
            CloudflareError::Api {
                status: Some(status),
                ..
            } => classify_status(*status),
            CloudflareError::Api { status: None, .. } => ErrorClass::Permanent,
            CloudflareError::MissingEnvVar(_) | CloudflareError::InvalidConfig(_) => {
                ErrorClass::InvalidConfig
            }
            CloudflareError::Http(e) if e.is_timeout() || e.is_connect() => {
                ErrorClass::Unavailable
            }
            CloudflareError::Http(e) => e
                .status()
                .map(|s| classify_status(s.as_u16()))
                .unwrap_or(ErrorClass::Unavailable),
            CloudflareError::JsonError(_) => ErrorClass::Permanent,
        }
    }
}

/// Map an HTTP status to an error class
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        429 => ErrorClass::Throttled,
        404 => ErrorClass::NotFound,
        500..=599 => ErrorClass::Unavailable,
        400..=499 => ErrorClass::InvalidConfig,
        _ => ErrorClass::Permanent,
    }
}

impl From<CloudflareError> for ControlPlaneError {
    fn from(err: CloudflareError) -> Self {
        ControlPlaneError::new(err.class(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CloudflareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(429), ErrorClass::Throttled);
        assert_eq!(classify_status(503), ErrorClass::Unavailable);
        assert_eq!(classify_status(400), ErrorClass::InvalidConfig);
        assert_eq!(classify_status(404), ErrorClass::NotFound);
        assert!(classify_status(502).is_retryable());
        assert!(!classify_status(403).is_retryable());
    }

    #[test]
    fn test_into_control_plane_error() {
        let err: ControlPlaneError = CloudflareError::Api {
            status: Some(429),
            message: "Rate limited".to_string(),
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.message, "Cloudflare API error (429): Rate limited");
    }
}
