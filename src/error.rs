use std::io;

use thiserror::Error;

/// Coarse grouping used by callers to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Open/close failures. Fatal to the session, never to the process.
    Source,
    /// A line fetch failed. The span stays uncached and is retried on the next viewport update.
    Fetch,
    /// A scroll or selection target outside the source. Reported as a no-op.
    Range,
    /// Invalid search regex. Search state is left unchanged.
    Pattern,
    /// SQL execution failures, including a rejected concurrent query.
    Query,
    Internal,
}

#[derive(Debug, Error)]
pub enum LensError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("SSH error connecting to {host}: {message}")]
    Ssh { host: String, message: String },
    #[error("File not found: {path}")]
    NotFound { path: String },
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },
    #[error("Unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: String, reason: String },
    #[error("No file open")]
    NoSourceOpen,
    #[error("Line range out of bounds: start={start}, line_count={line_count}")]
    OutOfRange { start: u64, line_count: u64 },
    #[error("Index {index} outside of 0..{line_count}")]
    IndexOutOfBounds { index: i64, line_count: u64 },
    #[error("invalid regex: {0}")]
    InvalidPattern(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("A query is already running")]
    QueryBusy,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LensError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LensError::Ssh { .. }
            | LensError::NotFound { .. }
            | LensError::PermissionDenied { .. }
            | LensError::UnsupportedFormat { .. }
            | LensError::NoSourceOpen => ErrorCategory::Source,
            LensError::Io(_) | LensError::Utf8(_) | LensError::OutOfRange { .. } => {
                ErrorCategory::Fetch
            }
            LensError::IndexOutOfBounds { .. } => ErrorCategory::Range,
            LensError::InvalidPattern(_) => ErrorCategory::Pattern,
            LensError::Query(_) | LensError::QueryBusy => ErrorCategory::Query,
            LensError::Config(_) | LensError::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Maps an `io::Error` raised while opening `path` onto the source taxonomy.
    pub fn from_open(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LensError::NotFound {
                path: path.to_string(),
            },
            io::ErrorKind::PermissionDenied => LensError::PermissionDenied {
                path: path.to_string(),
            },
            _ => LensError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_errors_map_to_source_category() {
        let err = LensError::from_open(io::Error::from(io::ErrorKind::NotFound), "/tmp/x.log");
        assert!(matches!(err, LensError::NotFound { ref path } if path == "/tmp/x.log"));
        assert_eq!(err.category(), ErrorCategory::Source);

        let err = LensError::from_open(
            io::Error::from(io::ErrorKind::PermissionDenied),
            "/root/secret.log",
        );
        assert!(matches!(err, LensError::PermissionDenied { .. }));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            LensError::IndexOutOfBounds { index: -1, line_count: 10 }.category(),
            ErrorCategory::Range
        );
        assert_eq!(
            LensError::OutOfRange { start: 10, line_count: 10 }.category(),
            ErrorCategory::Fetch
        );
        assert_eq!(
            LensError::InvalidPattern("(".to_string()).category(),
            ErrorCategory::Pattern
        );
        assert_eq!(LensError::QueryBusy.category(), ErrorCategory::Query);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LensError::IndexOutOfBounds { index: 10, line_count: 10 }.to_string(),
            "Index 10 outside of 0..10"
        );
        assert_eq!(LensError::NoSourceOpen.to_string(), "No file open");
    }
}
