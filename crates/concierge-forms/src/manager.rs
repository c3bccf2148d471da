//! Form session manager
//!
//! Holds one session per (tenant, user, form). Every mutation of a session
//! runs under that session's async mutex, so messages from one user are
//! applied strictly one after another. The completion sink runs under the
//! lock; if it fails the session is restored to its state before the final
//! answer, so the user can send it again. Terminal sessions are removed from
//! the map before the lock is released.

use crate::error::FormError;
use crate::machine::{CancelReason, FormInput, FormMachine, FormSession, FormState, SessionKey, StepOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_model::{CatalogStore, FormId, FormSchema, StoreError, TenantId, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Form session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub idle_timeout_secs: u64,
    pub max_retries: u8,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            max_retries: 2,
        }
    }
}

impl FormConfig {
    #[inline]
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_secs = timeout.as_secs();
        self
    }
}

/// Downstream side effect of a completed form (ticket creation and the like)
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn on_completed(&self, session: &FormSession, schema: &FormSchema) -> Result<(), StoreError>;
}

/// Sink that only logs completions
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl CompletionSink for TracingSink {
    async fn on_completed(&self, session: &FormSession, schema: &FormSchema) -> Result<(), StoreError> {
        tracing::info!(
            session = %session.id,
            tenant = %session.key.tenant,
            form = %schema.id,
            fields = session.collected.len(),
            "form completed"
        );
        Ok(())
    }
}

/// Session opened or resumed by a procedure trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session: FormSession,
    pub prompt: String,
    pub resumed: bool,
}

/// Session after one submitted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub session: FormSession,
    pub outcome: StepOutcome,
}

type Slot = Arc<Mutex<FormSession>>;

/// Concurrent registry of active form sessions
pub struct FormSessionManager {
    catalog: Arc<dyn CatalogStore>,
    sink: Arc<dyn CompletionSink>,
    machine: FormMachine,
    config: FormConfig,
    sessions: DashMap<SessionKey, Slot>,
}

impl FormSessionManager {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        sink: Arc<dyn CompletionSink>,
        config: FormConfig,
    ) -> Self {
        Self {
            catalog,
            sink,
            machine: FormMachine::new(config.max_retries),
            config,
            sessions: DashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// Number of active sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    async fn schema(&self, tenant: TenantId, form: &FormId) -> Result<Arc<FormSchema>, FormError> {
        self.catalog
            .form_schema(tenant, form)
            .await?
            .ok_or_else(|| FormError::UnknownForm(form.clone()))
    }

    fn slot(&self, key: &SessionKey) -> Option<Slot> {
        self.sessions.get(key).map(|s| Arc::clone(s.value()))
    }

    fn remove_slot(&self, key: &SessionKey, slot: &Slot) {
        self.sessions.remove_if(key, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Start a session for `form`, or resume the active one for the same key
    ///
    /// # Errors
    /// `FormError::UnknownForm` when the tenant has no such form, or the
    /// catalog's error
    #[tracing::instrument(skip_all, fields(tenant = %tenant, user = %user, form = %form))]
    pub async fn start_or_resume(
        &self,
        tenant: TenantId,
        user: UserId,
        form: FormId,
    ) -> Result<SessionStart, FormError> {
        let schema = self.schema(tenant, &form).await?;
        let key = SessionKey::new(tenant, user, form);

        loop {
            let mut opened = false;
            let slot = Arc::clone(
                self.sessions
                    .entry(key.clone())
                    .or_insert_with(|| {
                        opened = true;
                        Arc::new(Mutex::new(FormSession::open(key.clone(), Utc::now())))
                    })
                    .value(),
            );
            let session = slot.lock().await;

            // Lost a race with a session that just finished; it is already
            // out of the map, so the next pass opens a fresh one.
            if session.state.is_terminal() {
                drop(session);
                self.remove_slot(&key, &slot);
                continue;
            }

            let resumed = !opened;
            let prompt = self.machine.current_prompt(&session, &schema)?;
            tracing::info!(session = %session.id, resumed, "form session ready");
            return Ok(SessionStart {
                session: session.clone(),
                prompt,
                resumed,
            });
        }
    }

    /// Active session keys of a user, ordered by form id
    #[must_use]
    pub fn active_for_user(&self, tenant: TenantId, user: &UserId) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|e| e.key().tenant == tenant && &e.key().user == user)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Apply one user message to the session at `key`
    ///
    /// # Errors
    /// `FormError::NoSession` when no session is active for `key`,
    /// `FormError::SessionClosed` when it ended while this message waited,
    /// `FormError::Store` when the completion sink fails; the session then
    /// stays open at its last field
    #[tracing::instrument(skip_all, fields(tenant = %key.tenant, form = %key.form))]
    pub async fn submit(&self, key: &SessionKey, message: &str) -> Result<SubmitResult, FormError> {
        let schema = self.schema(key.tenant, &key.form).await?;
        let slot = self
            .slot(key)
            .ok_or_else(|| FormError::NoSession(key.clone()))?;

        let mut session = slot.lock().await;
        let before = session.clone();
        let outcome = self
            .machine
            .step(&mut session, &schema, FormInput::parse(message), Utc::now())?;
        if matches!(outcome, StepOutcome::Completed { .. }) {
            if let Err(err) = self.sink.on_completed(&session, &schema).await {
                tracing::error!(session = %session.id, %err, "form completion side effect failed");
                *session = before;
                return Err(err.into());
            }
        }
        let snapshot = session.clone();
        if snapshot.state.is_terminal() {
            self.remove_slot(key, &slot);
        }
        drop(session);

        match &outcome {
            StepOutcome::Completed { .. } => {
                tracing::info!(session = %snapshot.id, "form session completed");
            }
            StepOutcome::Cancelled { reason } => {
                tracing::info!(session = %snapshot.id, ?reason, "form session cancelled");
            }
            StepOutcome::Rejected { rejection, retries_left, .. } => {
                tracing::debug!(session = %snapshot.id, ?rejection, retries_left, "form input rejected");
            }
            StepOutcome::Accepted { .. } => {}
        }

        Ok(SubmitResult {
            session: snapshot,
            outcome,
        })
    }

    /// Cancel the session at `key` on the user's request
    ///
    /// # Errors
    /// `FormError::NoSession` when nothing is active for `key`
    pub async fn cancel(&self, key: &SessionKey) -> Result<FormSession, FormError> {
        let slot = self
            .slot(key)
            .ok_or_else(|| FormError::NoSession(key.clone()))?;
        let mut session = slot.lock().await;
        session.cancel(CancelReason::UserCancelled, Utc::now())?;
        self.remove_slot(key, &slot);
        tracing::info!(session = %session.id, "form session cancelled by user");
        Ok(session.clone())
    }

    /// Cancel every collecting session idle since before `now - idle_timeout`
    ///
    /// Sessions busy with a message are skipped; they are not idle.
    pub fn expire_idle(&self, now: DateTime<Utc>) -> Vec<FormSession> {
        let timeout = self.config.idle_timeout();
        let slots: Vec<(SessionKey, Slot)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut expired = Vec::new();
        for (key, slot) in slots {
            let Ok(mut session) = slot.try_lock() else {
                continue;
            };
            let idle = (now - session.updated_at)
                .to_std()
                .is_ok_and(|idle| idle >= timeout);
            if session.state != FormState::Collecting || !idle {
                continue;
            }
            if session.cancel(CancelReason::Idle, now).is_ok() {
                self.remove_slot(&key, &slot);
                expired.push(session.clone());
            }
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "idle form sessions expired");
        }
        expired
    }
}

impl std::fmt::Debug for FormSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSessionManager")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
