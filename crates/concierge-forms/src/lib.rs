//! Concierge Forms - procedure triggers and guided form sessions
//!
//! A matched procedure may start a data-collection form. This crate decides
//! when a procedure fires ([`ProcedureTrigger`]), validates field values
//! ([`validate_field`]), steps sessions through
//! `COLLECTING -> COMPLETED | CANCELLED` ([`FormMachine`]), and keeps one
//! serialized session per (tenant, user, form) ([`FormSessionManager`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_forms::{FormConfig, FormSessionManager, TracingSink};
//! use std::sync::Arc;
//!
//! let manager = FormSessionManager::new(catalog, Arc::new(TracingSink), FormConfig::default());
//! let start = manager.start_or_resume(tenant, user.clone(), form).await?;
//! println!("{}", start.prompt);
//! let step = manager.submit(&start.session.key, "0912345678").await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod machine;
pub mod manager;
pub mod trigger;
pub mod validate;

pub use error::FormError;
pub use machine::{
    allowed_transitions, validate_transition, CancelReason, FormInput, FormMachine, FormSession,
    FormState, SessionKey, StepOutcome, CANCEL_WORDS, SKIP_WORDS,
};
pub use manager::{
    CompletionSink, FormConfig, FormSessionManager, SessionStart, SubmitResult, TracingSink,
};
pub use trigger::{FiredBy, ProcedureTrigger, TriggerFire};
pub use validate::{taiwan_id_checksum, validate_field, FieldRejection};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
