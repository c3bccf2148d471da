//! Error types for the response cache

/// Cache backend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Cache marked down
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Malformed invalidation requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidationError {
    #[error("unknown invalidation type: {0:?}")]
    UnknownType(String),

    #[error("{kind} requires {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

impl InvalidationError {
    #[inline]
    pub(crate) fn missing(kind: &'static str, field: &'static str) -> Self {
        Self::MissingField { kind, field }
    }
}
