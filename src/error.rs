use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The classifier returned something that breaks its output contract.
    #[error("Invalid classifier output: {0}")]
    InvalidClassifierOutput(String),
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    /// A feature interchange row that does not fit its schema.
    #[error("Invalid feature row: {0}")]
    InvalidRow(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DetectorError::InvalidClassifierOutput("3 probabilities".to_string());
        assert_eq!(err.to_string(), "Invalid classifier output: 3 probabilities");

        let err = DetectorError::ModelLoad {
            path: PathBuf::from("models/missing.json"),
            reason: "not found".to_string(),
        };
        assert!(err.to_string().contains("models/missing.json"));

        let err = DetectorError::InvalidRow("expected 15 columns, got 3".to_string());
        assert_eq!(err.to_string(), "Invalid feature row: expected 15 columns, got 3");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DetectorError = io.into();
        assert!(matches!(err, DetectorError::Io(_)));
    }
}
