//! Error types for the query pipeline
//!
//! Every lower-layer error folds into one of four service-level kinds:
//! - provider failures (embedding/completion), which degrade answers
//! - store failures (catalog, cache, unclear store), surfaced to the caller
//! - invalid requests, rejected without side effects
//! - configuration errors at startup

use concierge_cache::{CacheError, InvalidationError};
use concierge_dedup::DedupError;
use concierge_forms::FormError;
use concierge_model::{ModelError, ProviderError, StoreError};
use concierge_retrieval::ScopeError;

/// Main pipeline error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Embedding or completion provider failed after retries
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    /// Catalog, cache or unclear-question store is down
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed request or unknown referenced record
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or validated
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    #[inline]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// Whether the caller may retry the same request
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable(err) => err.is_retryable(),
            Self::StoreUnavailable(_) => true,
            Self::InvalidRequest(_) | Self::Config(_) => false,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            not_found @ StoreError::NotFound { .. } => Self::InvalidRequest(not_found.to_string()),
        }
    }
}

impl From<CacheError> for PipelineError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(reason) => Self::StoreUnavailable(format!("cache: {reason}")),
        }
    }
}

impl From<InvalidationError> for PipelineError {
    fn from(err: InvalidationError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<DedupError> for PipelineError {
    fn from(err: DedupError) -> Self {
        match err {
            DedupError::EmptyQuestion => Self::invalid("empty question"),
            DedupError::Store(store) => store.into(),
        }
    }
}

impl From<FormError> for PipelineError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Store(store) => store.into(),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("cannot parse configuration: {0}")]
    Parse(String),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("environment variable {var}={value:?} is not valid")]
    Env { var: &'static str, value: String },

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ConfigError {
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
