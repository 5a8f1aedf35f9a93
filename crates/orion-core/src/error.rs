use thiserror::Error;

/// A convenience `Result` alias using [`OrionError`].
pub type OrionResult<T> = Result<T, OrionError>;

/// Top-level error type for the Orion client.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum OrionError {
    /// An error from the persistent text channel (connect, send, frame decode).
    #[error("Channel error: {0}")]
    Channel(String),

    /// An error from an outbound REST request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend rejected the bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An error related to session lookup or history.
    #[error("Session error: {0}")]
    Session(String),

    /// An error from the voice bridge or the third-party voice session.
    #[error("Voice error: {0}")]
    Voice(String),

    /// A device permission was refused (microphone).
    #[error("Permission denied: {0}")]
    Permission(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrionError::Permission("microphone".into());
        assert_eq!(err.to_string(), "Permission denied: microphone");
    }

    #[test]
    fn test_json_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: OrionError = parse.map_err(OrionError::from).unwrap_err();
        assert!(matches!(err, OrionError::Json(_)));
    }
}
