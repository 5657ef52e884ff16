//! Error types for the Conveyor plan panel

use thiserror::Error;

use crate::normalize::NormalizeError;

/// Result type alias using the panel Error
pub type Result<T> = std::result::Result<T, Error>;

/// Plan panel error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid resource data: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// True for failures that came from talking to the backend.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Api { .. } | Error::Http(_))
    }

    /// HTTP status the panel answers with for this error class.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Api { .. } | Error::Http(_) => 502,
            Error::Normalize(_) | Error::Validation(_) => 400,
            Error::Serialization(_) | Error::Yaml(_) => 400,
            Error::NotFound { .. } => 404,
            Error::Io(_) | Error::InvalidConfig(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        let api = Error::Api {
            status: 404,
            message: "Plan p1 could not be found".to_string(),
        };
        assert!(api.is_backend());
        assert_eq!(api.status_code(), 502);

        assert_eq!(Error::validation("bad action").status_code(), 400);
        assert_eq!(Error::not_found("resource", "server_0").status_code(), 404);
        assert_eq!(Error::InvalidConfig("x".to_string()).status_code(), 500);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::from(json).status_code(), 400);
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("resource", "router_9");
        assert!(!err.is_backend());
        assert_eq!(
            err.to_string(),
            "Resource not found: resource with id router_9"
        );
    }
}
