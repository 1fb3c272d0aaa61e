//! Error Handling Module
//!
//! Defines custom error types for the inoutdoor library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dataset and inference operations
#[derive(Error, Debug)]
pub enum SceneError {
    /// Zero-area or otherwise unusable pixel buffer
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Underlying file could not be read or decoded
    #[error("Failed to read source {0:?}: {1}")]
    SourceRead(PathBuf, String),

    /// Index outside the dataset range
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Configuration rejected at construction time
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sample shape does not match the expected shape
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Malformed dataset list file
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Model loading or serialization failure
    #[error("Model error: {0}")]
    Model(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for inoutdoor operations
pub type Result<T> = std::result::Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SceneError::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(
            format!("{}", err),
            "Index 7 out of range for dataset of length 3"
        );
    }

    #[test]
    fn test_source_read_error_includes_path() {
        let err = SceneError::SourceRead(PathBuf::from("/data/img.png"), "corrupt".to_string());
        assert!(format!("{}", err).contains("img.png"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SceneError = io.into();
        assert!(matches!(err, SceneError::Io(_)));
    }
}
