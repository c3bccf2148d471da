//! Unclear-question records and their store

use chrono::{DateTime, Utc};
use concierge_model::{Embedding, IntentId, StoreError, TenantId, UnclearId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclearStatus {
    Pending,
    InProgress,
    Resolved,
    Ignored,
}

impl UnclearStatus {
    /// Open records are the only merge targets
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl FromStr for UnclearStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "ignored" => Ok(Self::Ignored),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// Frequency-counted unanswered question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnclearQuestion {
    pub id: UnclearId,
    pub tenant: TenantId,
    /// First-seen wording; merges never change it
    pub question: String,
    pub normalized: String,
    pub frequency: u32,
    pub first_asked_at: DateTime<Utc>,
    pub last_asked_at: DateTime<Utc>,
    pub status: UnclearStatus,
    pub suggested_intent: Option<IntentId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Embedding>,
}

impl UnclearQuestion {
    #[must_use]
    pub fn first_occurrence(
        tenant: TenantId,
        question: impl Into<String>,
        normalized: impl Into<String>,
        embedding: Option<Embedding>,
        suggested_intent: Option<IntentId>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UnclearId::new(),
            tenant,
            question: question.into(),
            normalized: normalized.into(),
            frequency: 1,
            first_asked_at: at,
            last_asked_at: at,
            status: UnclearStatus::Pending,
            suggested_intent,
            embedding,
        }
    }
}

/// Persistence seam for unclear questions
#[async_trait::async_trait]
pub trait UnclearQuestionStore: Send + Sync {
    /// Open records of a tenant, most recently asked first, at most `limit`
    async fn open_candidates(
        &self,
        tenant: TenantId,
        limit: usize,
    ) -> Result<Vec<UnclearQuestion>, StoreError>;

    async fn insert(&self, record: UnclearQuestion) -> Result<(), StoreError>;

    /// Increment frequency and bump `last_asked_at`
    async fn record_hit(
        &self,
        id: UnclearId,
        at: DateTime<Utc>,
        suggested_intent: Option<IntentId>,
    ) -> Result<UnclearQuestion, StoreError>;

    /// Records of a tenant, highest frequency first
    async fn list(
        &self,
        tenant: TenantId,
        status: Option<UnclearStatus>,
    ) -> Result<Vec<UnclearQuestion>, StoreError>;

    async fn set_status(
        &self,
        id: UnclearId,
        status: UnclearStatus,
    ) -> Result<UnclearQuestion, StoreError>;
}

/// In-memory unclear-question store
#[derive(Debug, Default)]
pub struct InMemoryUnclearStore {
    records: RwLock<HashMap<UnclearId, UnclearQuestion>>,
}

impl InMemoryUnclearStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait::async_trait]
impl UnclearQuestionStore for InMemoryUnclearStore {
    async fn open_candidates(
        &self,
        tenant: TenantId,
        limit: usize,
    ) -> Result<Vec<UnclearQuestion>, StoreError> {
        let mut open: Vec<UnclearQuestion> = self
            .records
            .read()
            .values()
            .filter(|r| r.tenant == tenant && r.status.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| b.last_asked_at.cmp(&a.last_asked_at).then(a.id.cmp(&b.id)));
        open.truncate(limit);
        Ok(open)
    }

    async fn insert(&self, record: UnclearQuestion) -> Result<(), StoreError> {
        self.records.write().insert(record.id, record);
        Ok(())
    }

    async fn record_hit(
        &self,
        id: UnclearId,
        at: DateTime<Utc>,
        suggested_intent: Option<IntentId>,
    ) -> Result<UnclearQuestion, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("unclear question", id))?;
        record.frequency = record.frequency.saturating_add(1);
        record.last_asked_at = record.last_asked_at.max(at);
        if record.suggested_intent.is_none() {
            record.suggested_intent = suggested_intent;
        }
        Ok(record.clone())
    }

    async fn list(
        &self,
        tenant: TenantId,
        status: Option<UnclearStatus>,
    ) -> Result<Vec<UnclearQuestion>, StoreError> {
        let mut rows: Vec<UnclearQuestion> = self
            .records
            .read()
            .values()
            .filter(|r| r.tenant == tenant && status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then(b.last_asked_at.cmp(&a.last_asked_at))
        });
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: UnclearId,
        status: UnclearStatus,
    ) -> Result<UnclearQuestion, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("unclear question", id))?;
        record.status = status;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(tenant: u64, text: &str, at: DateTime<Utc>) -> UnclearQuestion {
        UnclearQuestion::first_occurrence(TenantId(tenant), text, text, None, None, at)
    }

    #[tokio::test]
    async fn open_candidates_are_bounded_recent_and_open_only() {
        let store = InMemoryUnclearStore::new();
        let now = Utc::now();
        let old = record(1, "old", now - Duration::hours(2));
        let new = record(1, "new", now);
        let mut done = record(1, "done", now);
        done.status = UnclearStatus::Resolved;
        let other = record(2, "other", now);
        for r in [old, new, done, other] {
            store.insert(r).await.unwrap();
        }

        let open = store.open_candidates(TenantId(1), 10).await.unwrap();
        let texts: Vec<&str> = open.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(texts, vec!["new", "old"]);

        let bounded = store.open_candidates(TenantId(1), 1).await.unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].question, "new");
    }

    #[tokio::test]
    async fn record_hit_increments_and_keeps_wording() {
        let store = InMemoryUnclearStore::new();
        let t0 = Utc::now();
        let r = record(1, "原始問題", t0);
        let id = r.id;
        store.insert(r).await.unwrap();

        let updated = store
            .record_hit(id, t0 + Duration::minutes(5), Some(IntentId(3)))
            .await
            .unwrap();
        assert_eq!(updated.frequency, 2);
        assert_eq!(updated.question, "原始問題");
        assert_eq!(updated.last_asked_at, t0 + Duration::minutes(5));
        assert_eq!(updated.first_asked_at, t0);
        assert_eq!(updated.suggested_intent, Some(IntentId(3)));
    }

    #[tokio::test]
    async fn status_changes_close_records() {
        let store = InMemoryUnclearStore::new();
        let r = record(1, "q", Utc::now());
        let id = r.id;
        store.insert(r).await.unwrap();
        store.set_status(id, UnclearStatus::Ignored).await.unwrap();
        assert!(store.open_candidates(TenantId(1), 10).await.unwrap().is_empty());
        assert_eq!(
            store.list(TenantId(1), Some(UnclearStatus::Ignored)).await.unwrap().len(),
            1
        );
        assert!(matches!(
            store.set_status(UnclearId::new(), UnclearStatus::Pending).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn status_parse() {
        assert_eq!("in_progress".parse::<UnclearStatus>(), Ok(UnclearStatus::InProgress));
        assert!("done".parse::<UnclearStatus>().is_err());
    }
}
