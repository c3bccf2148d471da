//! Form errors

use crate::machine::{FormState, SessionKey};
use concierge_model::{FormId, SessionId, StoreError};

/// Form session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("illegal form transition {from:?} -> {to:?}")]
    IllegalTransition { from: FormState, to: FormState },

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error("no active {} session for {} of {}", .0.form, .0.user, .0.tenant)]
    NoSession(SessionKey),

    #[error("unknown form {0}")]
    UnknownForm(FormId),

    #[error("form {form} has no field at index {index}")]
    FieldOutOfRange { form: FormId, index: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FormError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable(_)))
    }
}
