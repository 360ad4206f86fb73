use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("no file provided for upload")]
    MissingFile,

    #[error("no filename provided for upload")]
    EmptyFilename,

    #[error("file is empty")]
    EmptyFile,

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("file size ({size} bytes) exceeds maximum allowed size ({limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("{format} validation failed: {reason}")]
    Validation { format: String, reason: String },

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid processing status: {0}")]
    InvalidStatus(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("insufficient disk space: {available} bytes available, {required} bytes required")]
    InsufficientDiskSpace { available: u64, required: u64 },

    #[error("upload not found: {0}")]
    RecordNotFound(String),

    #[error("invalid status transition for {upload_id}: {from} -> {to}")]
    InvalidTransition {
        upload_id: String,
        from: String,
        to: String,
    },

    #[error("processing record already exists: {0}")]
    DuplicateRecord(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl IngestError {
    /// Stable external error code for the response envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            IngestError::MissingFile => "NO_FILE",
            IngestError::EmptyFilename => "EMPTY_FILENAME",
            IngestError::EmptyFile => "EMPTY_FILE",
            IngestError::UnsupportedExtension(_) => "INVALID_FILE_TYPE",
            IngestError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            IngestError::Validation { .. }
            | IngestError::InvalidUserId(_)
            | IngestError::InvalidStatus(_) => "VALIDATION_ERROR",
            IngestError::Storage(_) | IngestError::InsufficientDiskSpace { .. } => "STORAGE_ERROR",
            IngestError::RecordNotFound(_) => "NOT_FOUND",
            IngestError::InvalidTransition { .. }
            | IngestError::DuplicateRecord(_)
            | IngestError::ConfigRead(_)
            | IngestError::ConfigParse(_)
            | IngestError::Filesystem(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can recover by fixing the request and resubmitting.
    /// Drives the binary's exit-code mapping.
    pub fn caller_recoverable(&self) -> bool {
        !matches!(
            self,
            IngestError::InvalidTransition { .. }
                | IngestError::DuplicateRecord(_)
                | IngestError::ConfigRead(_)
                | IngestError::ConfigParse(_)
                | IngestError::Filesystem(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_are_recoverable() {
        for err in [
            IngestError::MissingFile,
            IngestError::EmptyFilename,
            IngestError::EmptyFile,
            IngestError::UnsupportedExtension("exe".to_string()),
            IngestError::FileTooLarge { size: 6, limit: 5 },
            IngestError::Validation {
                format: "vcf".to_string(),
                reason: "bad".to_string(),
            },
            IngestError::RecordNotFound("x".to_string()),
            IngestError::Storage("disk".to_string()),
        ] {
            assert!(err.caller_recoverable(), "{err} should be recoverable");
        }
    }

    #[test]
    fn internal_errors_are_not_recoverable() {
        for err in [
            IngestError::InvalidTransition {
                upload_id: "x".to_string(),
                from: "completed".to_string(),
                to: "processing".to_string(),
            },
            IngestError::DuplicateRecord("x".to_string()),
            IngestError::ConfigParse("bad json".to_string()),
            IngestError::Filesystem("io".to_string()),
        ] {
            assert!(!err.caller_recoverable(), "{err} should not be recoverable");
            assert_eq!(err.error_code(), "INTERNAL_ERROR");
        }
    }
}
