//! Sensor error types.

use thiserror::Error;

/// Errors that can occur while polling a backend or loading configuration.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Storage type is not one of the supported backends.
    #[error("Unsupported storage type: {0}. Supported options are ['snowflake', 's3']")]
    UnsupportedBackend(String),

    /// S3 check mode is not one of the supported modes.
    #[error("Unsupported check mode: {0}. Use one of files_metadata, file_modified_ts, or file_size")]
    UnsupportedCheckMode(String),

    /// Backend query execution failed. Surfaced immediately, never retried.
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// SQL template loading or rendering error.
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run history could not be read or written.
    #[error("Run history error: {0}")]
    History(String),

    /// Event publication failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Authentication error against a backend.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SensorError {
    fn from(e: std::io::Error) -> Self {
        SensorError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SensorError {
    fn from(e: serde_json::Error) -> Self {
        SensorError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for SensorError {
    fn from(e: reqwest::Error) -> Self {
        SensorError::Http(e.to_string())
    }
}

impl From<minijinja::Error> for SensorError {
    fn from(e: minijinja::Error) -> Self {
        SensorError::Template(e.to_string())
    }
}

impl From<object_store::Error> for SensorError {
    fn from(e: object_store::Error) -> Self {
        SensorError::QueryExecution(e.to_string())
    }
}

/// Result type alias using SensorError.
pub type SensorResult<T> = Result<T, SensorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SensorError::UnsupportedBackend("bogus".to_string());
        assert_eq!(
            err.to_string(),
            "Unsupported storage type: bogus. Supported options are ['snowflake', 's3']"
        );

        let err = SensorError::UnsupportedCheckMode("unknown".to_string());
        assert!(err.to_string().contains("files_metadata"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SensorError = io_err.into();
        assert!(matches!(err, SensorError::Io(_)));
    }
}
