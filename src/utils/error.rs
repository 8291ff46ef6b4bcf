//! Error Handling Module
//!
//! Defines custom error types for the maskvision library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for maskvision operations
#[derive(Error, Debug)]
pub enum MaskVisionError {
    /// Error loading or processing an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A registry lookup with a key nobody registered
    #[error("Unknown {kind} '{key}' (expected one of: {known})")]
    UnknownKey {
        kind: &'static str,
        key: String,
        known: &'static str,
    },

    /// Cross-validation needs at least two folds
    #[error("Invalid fold count {0}: cross-validation requires at least 2 folds")]
    InvalidFoldCount(usize),

    /// Failure writing or reading a model checkpoint
    #[error("Checkpoint error at '{path}': {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for maskvision operations
pub type Result<T> = std::result::Result<T, MaskVisionError>;

impl From<serde_json::Error> for MaskVisionError {
    fn from(err: serde_json::Error) -> Self {
        MaskVisionError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaskVisionError::Dataset("test error".to_string());
        assert_eq!(format!("{}", err), "Dataset error: test error");
    }

    #[test]
    fn test_unknown_key_lists_candidates() {
        let err = MaskVisionError::UnknownKey {
            kind: "optimizer",
            key: "adamw".to_string(),
            known: "sgd, adam",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("adamw"));
        assert!(msg.contains("sgd, adam"));
    }

    #[test]
    fn test_invalid_fold_count() {
        let err = MaskVisionError::InvalidFoldCount(1);
        assert!(format!("{}", err).contains("at least 2"));
    }

    #[test]
    fn test_image_load_names_the_file() {
        let err = MaskVisionError::ImageLoad(PathBuf::from("photo.jpg"), "bad header".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("photo.jpg"));
        assert!(msg.contains("bad header"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MaskVisionError = io.into();
        assert!(matches!(err, MaskVisionError::Io(_)));
    }
}
