//! FormSession state machine
//!
//! A session collects one field at a time. Valid input advances the cursor and
//! resets the retry counter; invalid input re-prompts until the retry budget is
//! spent, at which point the session is cancelled. Completed and cancelled are
//! terminal.

use crate::error::FormError;
use crate::validate::{validate_field, FieldRejection};
use chrono::{DateTime, Utc};
use concierge_model::{normalize_question, FormId, FormSchema, SessionId, TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Words that cancel an active session
pub const CANCEL_WORDS: [&str; 3] = ["取消", "算了", "cancel"];

/// Words that skip an optional field
pub const SKIP_WORDS: [&str; 2] = ["跳過", "skip"];

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormState {
    Collecting,
    Completed,
    Cancelled,
}

impl FormState {
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Check a state transition against the transition table
///
/// # Errors
/// `FormError::IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: FormState, to: FormState) -> Result<(), FormError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(FormError::IllegalTransition { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: FormState) -> Vec<FormState> {
    use FormState::*;
    match from {
        Collecting => vec![Collecting, Completed, Cancelled],
        Completed => vec![],
        Cancelled => vec![],
    }
}

/// Why a session ended in `Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    UserCancelled,
    RetryLimit,
    Idle,
}

/// One active form per (tenant, user, form)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub tenant: TenantId,
    pub user: UserId,
    pub form: FormId,
}

impl SessionKey {
    #[inline]
    #[must_use]
    pub fn new(tenant: TenantId, user: UserId, form: FormId) -> Self {
        Self { tenant, user, form }
    }
}

/// Guided data-collection session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSession {
    pub id: SessionId,
    pub key: SessionKey,
    pub state: FormState,
    pub current_field_index: usize,
    /// Field name to accepted value; skipped optional fields are absent
    pub collected: BTreeMap<String, String>,
    /// Consecutive invalid inputs on the current field, never above the limit
    pub retry_count: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cancel_reason: Option<CancelReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormSession {
    #[must_use]
    pub fn open(key: SessionKey, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            key,
            state: FormState::Collecting,
            current_field_index: 0,
            collected: BTreeMap::new(),
            retry_count: 0,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: FormState, now: DateTime<Utc>) -> Result<(), FormError> {
        validate_transition(self.state, to)?;
        self.state = to;
        self.updated_at = now;
        Ok(())
    }

    /// Move to `Cancelled`
    ///
    /// # Errors
    /// `FormError::IllegalTransition` on a terminal session
    pub fn cancel(&mut self, reason: CancelReason, now: DateTime<Utc>) -> Result<(), FormError> {
        self.transition(FormState::Cancelled, now)?;
        self.cancel_reason = Some(reason);
        Ok(())
    }
}

/// User input for the current field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormInput {
    Answer(String),
    Cancel,
}

impl FormInput {
    /// Classify a raw chat message, recognising cancel words
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if is_one_of(raw, &CANCEL_WORDS) {
            Self::Cancel
        } else {
            Self::Answer(raw.to_string())
        }
    }
}

fn is_one_of(raw: &str, words: &[&str]) -> bool {
    let normalized = normalize_question(raw);
    words.iter().any(|w| normalized == *w)
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Value stored (or optional field skipped); ask the next question
    Accepted { next_prompt: String },
    /// Value refused; ask the same question again
    Rejected {
        rejection: FieldRejection,
        retries_left: u8,
        prompt: String,
    },
    Completed {
        collected: BTreeMap<String, String>,
        message: Option<String>,
    },
    Cancelled { reason: CancelReason },
}

/// Drives sessions through the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormMachine {
    max_retries: u8,
}

impl Default for FormMachine {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl FormMachine {
    #[inline]
    #[must_use]
    pub const fn new(max_retries: u8) -> Self {
        Self { max_retries }
    }

    #[inline]
    #[must_use]
    pub const fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// Prompt for the field the session is waiting on
    ///
    /// # Errors
    /// `FormError::FieldOutOfRange` when the cursor is past the schema
    pub fn current_prompt(
        &self,
        session: &FormSession,
        schema: &FormSchema,
    ) -> Result<String, FormError> {
        schema
            .field(session.current_field_index)
            .map(|f| f.prompt.clone())
            .ok_or_else(|| FormError::FieldOutOfRange {
                form: schema.id.clone(),
                index: session.current_field_index,
            })
    }

    /// Apply one input to a collecting session
    ///
    /// # Errors
    /// `FormError::SessionClosed` on a terminal session,
    /// `FormError::FieldOutOfRange` if the schema shrank under the session
    pub fn step(
        &self,
        session: &mut FormSession,
        schema: &FormSchema,
        input: FormInput,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, FormError> {
        if session.state.is_terminal() {
            return Err(FormError::SessionClosed(session.id));
        }

        let raw = match input {
            FormInput::Cancel => {
                session.cancel(CancelReason::UserCancelled, now)?;
                return Ok(StepOutcome::Cancelled {
                    reason: CancelReason::UserCancelled,
                });
            }
            FormInput::Answer(raw) => raw,
        };

        let index = session.current_field_index;
        let field = schema.field(index).ok_or_else(|| FormError::FieldOutOfRange {
            form: schema.id.clone(),
            index,
        })?;

        let accepted = if !field.required && is_one_of(&raw, &SKIP_WORDS) {
            None
        } else {
            match validate_field(field, &raw) {
                Ok(value) if value.is_empty() => None,
                Ok(value) => Some(value),
                Err(rejection) => return self.reject(session, rejection, field.prompt.clone(), now),
            }
        };

        if let Some(value) = accepted {
            session.collected.insert(field.name.clone(), value);
        }
        session.retry_count = 0;
        session.current_field_index += 1;

        match schema.field(session.current_field_index) {
            Some(next) => {
                session.transition(FormState::Collecting, now)?;
                Ok(StepOutcome::Accepted {
                    next_prompt: next.prompt.clone(),
                })
            }
            None => {
                session.transition(FormState::Completed, now)?;
                Ok(StepOutcome::Completed {
                    collected: session.collected.clone(),
                    message: schema.completion_message.clone(),
                })
            }
        }
    }

    fn reject(
        &self,
        session: &mut FormSession,
        rejection: FieldRejection,
        prompt: String,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, FormError> {
        let attempts = session.retry_count.saturating_add(1);
        if attempts > self.max_retries {
            session.cancel(CancelReason::RetryLimit, now)?;
            return Ok(StepOutcome::Cancelled {
                reason: CancelReason::RetryLimit,
            });
        }
        session.retry_count = attempts;
        session.transition(FormState::Collecting, now)?;
        Ok(StepOutcome::Rejected {
            rejection,
            retries_left: self.max_retries - attempts,
            prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_model::{FieldKind, FormField};

    fn schema() -> FormSchema {
        let mut schema = FormSchema::new(
            FormId::new("repair_request"),
            TenantId(1),
            "報修",
            vec![
                FormField::new("location", "請問是哪個位置需要維修?", FieldKind::Text),
                FormField::new("note", "還有其他補充嗎?", FieldKind::Text).optional(),
                FormField::new("phone", "請留下聯絡電話", FieldKind::Phone),
            ],
        )
        .unwrap();
        schema.completion_message = Some("已收到您的報修".to_string());
        schema
    }

    fn session() -> FormSession {
        FormSession::open(
            SessionKey::new(TenantId(1), UserId::new("u1"), FormId::new("repair_request")),
            Utc::now(),
        )
    }

    fn answer(text: &str) -> FormInput {
        FormInput::parse(text)
    }

    #[test]
    fn transition_table() {
        assert!(validate_transition(FormState::Collecting, FormState::Completed).is_ok());
        assert!(validate_transition(FormState::Collecting, FormState::Collecting).is_ok());
        assert_eq!(
            validate_transition(FormState::Completed, FormState::Collecting),
            Err(FormError::IllegalTransition {
                from: FormState::Completed,
                to: FormState::Collecting
            })
        );
        assert!(allowed_transitions(FormState::Cancelled).is_empty());
    }

    #[test]
    fn happy_path_completes_with_skip() {
        let machine = FormMachine::default();
        let schema = schema();
        let mut s = session();
        let now = Utc::now();

        assert_eq!(
            machine.step(&mut s, &schema, answer("浴室"), now).unwrap(),
            StepOutcome::Accepted {
                next_prompt: "還有其他補充嗎?".to_string()
            }
        );
        assert!(matches!(
            machine.step(&mut s, &schema, answer("跳過"), now).unwrap(),
            StepOutcome::Accepted { .. }
        ));
        let done = machine.step(&mut s, &schema, answer("0912345678"), now).unwrap();
        let StepOutcome::Completed { collected, message } = done else {
            panic!("expected completion, got {done:?}");
        };
        assert_eq!(collected.get("location").map(String::as_str), Some("浴室"));
        assert!(!collected.contains_key("note"));
        assert_eq!(message.as_deref(), Some("已收到您的報修"));
        assert_eq!(s.state, FormState::Completed);
    }

    #[test]
    fn skip_word_on_required_field_is_just_text() {
        let machine = FormMachine::default();
        let schema = schema();
        let mut s = session();
        machine.step(&mut s, &schema, answer("skip"), Utc::now()).unwrap();
        assert_eq!(s.collected.get("location").map(String::as_str), Some("skip"));
    }

    #[test]
    fn third_invalid_input_cancels() {
        let machine = FormMachine::default();
        let schema = schema();
        let mut s = session();
        s.current_field_index = 2;
        let now = Utc::now();

        let first = machine.step(&mut s, &schema, answer("abc"), now).unwrap();
        assert!(matches!(first, StepOutcome::Rejected { retries_left: 1, .. }));
        assert_eq!(s.retry_count, 1);

        let second = machine.step(&mut s, &schema, answer("123"), now).unwrap();
        assert!(matches!(second, StepOutcome::Rejected { retries_left: 0, .. }));
        assert_eq!(s.retry_count, 2);

        let third = machine.step(&mut s, &schema, answer("nope"), now).unwrap();
        assert_eq!(
            third,
            StepOutcome::Cancelled {
                reason: CancelReason::RetryLimit
            }
        );
        assert_eq!(s.state, FormState::Cancelled);
        assert!(s.retry_count <= 2);
    }

    #[test]
    fn valid_answer_resets_retries() {
        let machine = FormMachine::default();
        let mut schema = schema();
        schema.fields.push(FormField::new("email", "Email?", FieldKind::Email));
        let mut s = session();
        s.current_field_index = 2;
        let now = Utc::now();

        machine.step(&mut s, &schema, answer("abc"), now).unwrap();
        machine.step(&mut s, &schema, answer("abc"), now).unwrap();
        machine.step(&mut s, &schema, answer("0912345678"), now).unwrap();
        assert_eq!(s.retry_count, 0);
        machine.step(&mut s, &schema, answer("x"), now).unwrap();
        machine.step(&mut s, &schema, answer("y"), now).unwrap();
        assert_eq!(s.state, FormState::Collecting);
    }

    #[test]
    fn cancel_word_cancels_and_terminal_rejects_input() {
        let machine = FormMachine::default();
        let schema = schema();
        let mut s = session();
        let now = Utc::now();

        assert_eq!(FormInput::parse(" 算了 "), FormInput::Cancel);
        assert_eq!(FormInput::parse("CANCEL"), FormInput::Cancel);
        assert_eq!(
            machine.step(&mut s, &schema, FormInput::Cancel, now).unwrap(),
            StepOutcome::Cancelled {
                reason: CancelReason::UserCancelled
            }
        );
        assert_eq!(
            machine.step(&mut s, &schema, answer("浴室"), now),
            Err(FormError::SessionClosed(s.id))
        );
    }
}
