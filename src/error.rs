// src/error.rs
// Error types for the prime search pipeline

use thiserror::Error;

/// Main error type for the primerun library
#[derive(Error, Debug)]
pub enum PrimeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed resume data: {0}")]
    MalformedResumeData(String),

    #[error("malformed record on line {line}: {content:?}")]
    MalformedRecord { line: u64, content: String },

    #[error("numeric range exhausted at {current}")]
    RangeExhausted { current: u64 },

    #[error("engine faulted earlier; reopen the store to resume")]
    Faulted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine task failed: {0}")]
    Join(String),

    #[error("engine task cancelled")]
    Cancelled,
}

/// Convenience type alias for Result using PrimeError
pub type Result<T> = std::result::Result<T, PrimeError>;

impl From<tokio::task::JoinError> for PrimeError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            PrimeError::Cancelled
        } else {
            PrimeError::Join(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_exhausted_message() {
        let err = PrimeError::RangeExhausted { current: 42 };
        assert!(err.to_string().contains("range exhausted"));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: PrimeError = io_err.into();
        assert!(matches!(err, PrimeError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_malformed_record_message() {
        let err = PrimeError::MalformedRecord {
            line: 3,
            content: "abc".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("\"abc\""));
    }

    #[tokio::test]
    async fn test_from_join_error() {
        let join_err = tokio::spawn(async { panic!("sieve bug") }).await.unwrap_err();
        let err: PrimeError = join_err.into();
        assert!(matches!(err, PrimeError::Join(_)));

        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err: PrimeError = handle.await.unwrap_err().into();
        assert!(matches!(err, PrimeError::Cancelled));
    }

    #[test]
    fn test_config_error() {
        let err = PrimeError::Config("batch size must be positive".to_string());
        assert!(err.to_string().contains("configuration error"));
    }
}
