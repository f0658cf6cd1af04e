//! Error types for the Kinesis client.
//!
//! Provides a unified error type covering configuration, credential lookup,
//! transport, serialization, and service-level failures.

use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid or missing client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential lookup failed.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The HTTP request could not be completed.
    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Request or response body could not be encoded/decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The service returned an error response.
    #[error("kinesis error {code}: {message}")]
    Api { code: String, message: String },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_config() {
        let err = ClientError::Config("missing region".to_string());
        assert!(format!("{}", err).contains("missing region"));
    }

    #[test]
    fn test_display_api() {
        let err = ClientError::Api {
            code: "ResourceNotFoundException".to_string(),
            message: "Stream not found".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ResourceNotFoundException"));
        assert!(msg.contains("Stream not found"));
    }

    #[test]
    fn test_question_mark_propagation() {
        fn inner() -> Result<()> {
            Err(ClientError::Credentials("no keys".to_string()))?;
            Ok(())
        }
        assert!(inner().is_err());
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_std_error<E: std::error::Error>(_e: &E) {}
        let err = ClientError::Serialization("bad json".to_string());
        assert_std_error(&err);
    }
}
