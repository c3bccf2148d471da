//! Error types for the data model

/// Model construction and parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Business scope name outside the closed set
    #[error("unknown business scope: {0:?} (expected \"external\" or \"internal\")")]
    UnknownScope(String),

    /// Procedure item without any embedding
    #[error("procedure {0} has neither a primary nor a fallback embedding")]
    MissingProcedureEmbedding(u64),

    /// Intent threshold outside [0, 1]
    #[error("intent {id} confidence threshold {threshold} outside [0, 1]")]
    InvalidThreshold { id: u64, threshold: String },

    /// Form schema with no fields
    #[error("form {0} declares no fields")]
    EmptyForm(String),
}

/// Catalog store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or refusing requests
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Record not found
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
}

impl StoreError {
    #[inline]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    #[inline]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
