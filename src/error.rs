use thiserror::Error;

/// Store that took part in a write fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Vector,
    Graph,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Vector => write!(f, "vector"),
            StoreKind::Graph => write!(f, "graph"),
        }
    }
}

/// Error types for the hybrid retrieval engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Id already exists: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Partial ingestion: stored in {stored:?}, failed in {failed:?}")]
    PartialIngestion {
        stored: Vec<StoreKind>,
        failed: Vec<(StoreKind, String)>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Stable machine-readable tag for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Conflict(_) => "conflict",
            Error::Upstream(_) => "upstream_error",
            Error::Timeout(_) => "timeout",
            Error::PartialIngestion { .. } => "partial_ingestion_error",
            Error::Configuration(_) => "configuration_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Wrap any failure coming out of a collaborator as an upstream error.
    /// Errors that already carry a caller-facing kind pass through unchanged.
    pub fn upstream(context: &str, err: Error) -> Error {
        match err {
            Error::Upstream(msg) => Error::Upstream(format!("{}: {}", context, msg)),
            e @ (Error::Validation(_)
            | Error::NotFound(_)
            | Error::DimensionMismatch { .. }
            | Error::Conflict(_)
            | Error::Timeout(_)) => e,
            other => Error::Upstream(format!("{}: {}", context, other)),
        }
    }
}

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(err.to_string())
    }
}

impl<E: std::fmt::Display> From<backoff::Error<E>> for Error {
    fn from(err: backoff::Error<E>) -> Self {
        match err {
            backoff::Error::Permanent(e) => Error::Upstream(e.to_string()),
            backoff::Error::Transient { err, retry_after: _ } => {
                Error::Upstream(format!("Transient error: {}", err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DimensionMismatch { expected: 384, actual: 3 };
        assert_eq!(err.to_string(), "Embedding dimension mismatch: expected 384, got 3");
    }

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(Error::Validation("x".into()).kind(), "validation_error");
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(Error::Upstream("x".into()).kind(), "upstream_error");
        assert_eq!(
            Error::PartialIngestion { stored: vec![StoreKind::Vector], failed: vec![] }.kind(),
            "partial_ingestion_error"
        );
    }

    #[test]
    fn test_upstream_wraps_internal_errors() {
        let err = Error::upstream("vector search", Error::Serialization("bad".into()));
        assert!(matches!(err, Error::Upstream(_)));

        let err = Error::upstream("vector search", Error::DimensionMismatch { expected: 4, actual: 2 });
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_transient_backoff_conversion() {
        let retry_err = backoff::Error::Transient {
            err: "connection reset".to_string(),
            retry_after: None,
        };
        let err: Error = retry_err.into();
        assert!(matches!(err, Error::Upstream(ref m) if m.contains("Transient")));
    }
}
