//! Unclear-question deduplicator

use crate::layers::{find_match, Evidence, LayerThresholds, MatchLayer, Probe};
use crate::phonetic::{PhoneticEncoder, PinyinEncoder};
use crate::store::{UnclearQuestion, UnclearQuestionStore};
use chrono::Utc;
use concierge_model::{normalize_question, Embedding, EmbeddingProvider, IntentId, StoreError, TenantId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Deduplicator configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub thresholds: LayerThresholds,
    /// Most recent open records considered per tenant
    pub scan_limit: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            thresholds: LayerThresholds::default(),
            scan_limit: 100,
        }
    }
}

/// Deduplication errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DedupError {
    #[error("empty question")]
    EmptyQuestion,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of recording one unclear question
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub record: UnclearQuestion,
    /// `None` when a new record was created
    pub evidence: Option<Evidence>,
}

impl DedupOutcome {
    #[inline]
    #[must_use]
    pub fn merged_by(&self) -> Option<MatchLayer> {
        self.evidence.map(|e| e.layer)
    }
}

/// Folds near-duplicate unclear questions into frequency-counted records
///
/// Records of one tenant are matched and written under a per-tenant lock so
/// two concurrent near-duplicates cannot both create a record. Embedding
/// happens before the lock is taken.
pub struct Deduplicator {
    store: Arc<dyn UnclearQuestionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    encoder: Arc<dyn PhoneticEncoder>,
    config: DedupConfig,
    tenant_locks: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl Deduplicator {
    #[must_use]
    pub fn new(
        store: Arc<dyn UnclearQuestionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: DedupConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            encoder: Arc::new(PinyinEncoder),
            config,
            tenant_locks: DashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn PhoneticEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn UnclearQuestionStore> {
        &self.store
    }

    /// Record a question, embedding it first
    ///
    /// An embedding failure is not fatal: matching falls back to the lexical
    /// layers.
    ///
    /// # Errors
    /// `DedupError::EmptyQuestion`, or the store's error
    pub async fn record(
        &self,
        tenant: TenantId,
        question: &str,
        suggested_intent: Option<IntentId>,
    ) -> Result<DedupOutcome, DedupError> {
        let embedding = match self.embedder.embed(question).await {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                tracing::warn!(%tenant, %err, "embedding failed, lexical dedup only");
                None
            }
        };
        self.record_with_embedding(tenant, question, embedding, suggested_intent)
            .await
    }

    /// Record a question whose embedding is already known
    ///
    /// # Errors
    /// `DedupError::EmptyQuestion`, or the store's error
    pub async fn record_with_embedding(
        &self,
        tenant: TenantId,
        question: &str,
        embedding: Option<Embedding>,
        suggested_intent: Option<IntentId>,
    ) -> Result<DedupOutcome, DedupError> {
        let normalized = normalize_question(question);
        if normalized.is_empty() {
            return Err(DedupError::EmptyQuestion);
        }

        let lock = self
            .tenant_locks
            .entry(tenant)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let existing = self
            .store
            .open_candidates(tenant, self.config.scan_limit)
            .await?;

        let probe = Probe {
            text: &normalized,
            embedding: embedding.as_ref(),
        };
        let candidates: Vec<Probe<'_>> = existing
            .iter()
            .map(|r| Probe {
                text: &r.normalized,
                embedding: r.embedding.as_ref(),
            })
            .collect();

        let now = Utc::now();
        if let Some((idx, evidence)) =
            find_match(&probe, &candidates, &self.config.thresholds, self.encoder.as_ref())
        {
            let target = &existing[idx];
            let record = self
                .store
                .record_hit(target.id, now, suggested_intent)
                .await?;
            tracing::info!(
                %tenant,
                id = %record.id,
                layer = ?evidence.layer,
                frequency = record.frequency,
                "unclear question merged"
            );
            return Ok(DedupOutcome {
                record,
                evidence: Some(evidence),
            });
        }

        let record = UnclearQuestion::first_occurrence(
            tenant,
            question.trim(),
            normalized,
            embedding,
            suggested_intent,
            now,
        );
        self.store.insert(record.clone()).await?;
        tracing::info!(%tenant, id = %record.id, "unclear question recorded");
        Ok(DedupOutcome {
            record,
            evidence: None,
        })
    }
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("config", &self.config)
            .field("tenants", &self.tenant_locks.len())
            .finish_non_exhaustive()
    }
}
