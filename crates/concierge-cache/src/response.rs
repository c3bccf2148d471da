//! Fingerprint-keyed response cache
//!
//! Provides:
//! - TTL-bound storage of gated answers keyed by [`Fingerprint`]
//! - Reverse indexes (source, intent, tenant) for event-driven invalidation
//! - An invalidation epoch so that answers computed before an invalidation
//!   cannot be written after it
//! - Availability state for health reporting

use crate::answer::CachedAnswer;
use crate::error::CacheError;
use crate::invalidation::{apply_steps, InvalidationEvent, InvalidationReport, InvalidationTarget};
use chrono::{DateTime, Utc};
use concierge_model::{Fingerprint, IntentId, SourceId, TenantId};
use dashmap::DashMap;
use moka::future::Cache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
    pub embedding_max_entries: u64,
    pub embedding_ttl_secs: u64,
    /// Answer-model version folded into every fingerprint
    pub model_version: String,
}

impl CacheConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 3_600,
            embedding_max_entries: 50_000,
            embedding_ttl_secs: 7_200,
            model_version: "v1".to_string(),
        }
    }
}

/// Up/down state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub up: bool,
    pub reason: Option<String>,
}

/// Response cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCacheStats {
    pub entries: u64,
    pub tracked_sources: usize,
    pub tracked_intents: usize,
    pub tracked_tenants: usize,
    pub hits: u64,
    pub misses: u64,
    pub epoch: u64,
}

#[derive(Debug)]
struct CacheEntry {
    tenant: TenantId,
    answer: CachedAnswer,
    stored_at: DateTime<Utc>,
}

impl CacheEntry {
    fn cites(&self, target: InvalidationTarget) -> bool {
        match target {
            InvalidationTarget::Source(id) => self.answer.sources.iter().any(|s| s.id == id),
            InvalidationTarget::Intent(id) => self.answer.intents.contains(&id),
            InvalidationTarget::Tenant(id) => self.tenant == id,
        }
    }
}

/// Target to fingerprint sets
///
/// Sets may hold fingerprints whose entry has since expired or been replaced
/// by one citing other targets. Invalidation checks the live entry before
/// removing it, and [`ReverseIndex::prune`] drops expired fingerprints.
#[derive(Debug, Default)]
struct ReverseIndex {
    by_source: DashMap<SourceId, HashSet<Fingerprint>>,
    by_intent: DashMap<IntentId, HashSet<Fingerprint>>,
    by_tenant: DashMap<TenantId, HashSet<Fingerprint>>,
}

impl ReverseIndex {
    fn record(&self, fp: Fingerprint, entry: &CacheEntry) {
        for source in &entry.answer.sources {
            self.by_source.entry(source.id).or_default().insert(fp);
        }
        for intent in &entry.answer.intents {
            self.by_intent.entry(*intent).or_default().insert(fp);
        }
        self.by_tenant.entry(entry.tenant).or_default().insert(fp);
    }

    fn take(&self, target: InvalidationTarget) -> Vec<Fingerprint> {
        let taken = match target {
            InvalidationTarget::Source(id) => self.by_source.remove(&id).map(|(_, set)| set),
            InvalidationTarget::Intent(id) => self.by_intent.remove(&id).map(|(_, set)| set),
            InvalidationTarget::Tenant(id) => self.by_tenant.remove(&id).map(|(_, set)| set),
        };
        taken.map(|set| set.into_iter().collect()).unwrap_or_default()
    }

    fn prune(&self, live: impl Fn(&Fingerprint) -> bool) {
        prune_map(&self.by_source, &live);
        prune_map(&self.by_intent, &live);
        prune_map(&self.by_tenant, &live);
    }

    fn clear(&self) {
        self.by_source.clear();
        self.by_intent.clear();
        self.by_tenant.clear();
    }
}

fn prune_map<K: Eq + Hash>(
    map: &DashMap<K, HashSet<Fingerprint>>,
    live: &impl Fn(&Fingerprint) -> bool,
) {
    map.retain(|_, set| {
        set.retain(|fp| live(fp));
        !set.is_empty()
    });
}

/// Semantic response cache
pub struct ResponseCache {
    entries: Cache<Fingerprint, Arc<CacheEntry>>,
    index: ReverseIndex,
    /// Writers take it shared, invalidation takes it exclusive
    gate: tokio::sync::RwLock<()>,
    epoch: AtomicU64,
    down: RwLock<Option<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    model_version: String,
}

impl ResponseCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(Duration::from_secs(config.ttl_secs))
                .build(),
            index: ReverseIndex::default(),
            gate: tokio::sync::RwLock::new(()),
            epoch: AtomicU64::new(0),
            down: RwLock::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            model_version: config.model_version.clone(),
        }
    }

    /// Fingerprint for a question under this cache's model version
    #[inline]
    #[must_use]
    pub fn fingerprint(&self, tenant: TenantId, question: &str) -> Fingerprint {
        Fingerprint::compute(tenant, question, &self.model_version)
    }

    /// Current invalidation epoch
    ///
    /// Read it before computing an answer and hand it to
    /// [`insert_if_fresh`](Self::insert_if_fresh).
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> Result<(), CacheError> {
        match self.down.read().as_ref() {
            Some(reason) => Err(CacheError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Look up a cached answer
    ///
    /// # Errors
    /// `CacheError::Unavailable` while marked down
    pub async fn lookup(&self, fp: &Fingerprint) -> Result<Option<CachedAnswer>, CacheError> {
        self.check_up()?;
        match self.entries.get(fp).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(fingerprint = %fp.short(), stored_at = %entry.stored_at, "cache hit");
                Ok(Some(entry.answer.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Store an answer unless an invalidation ran since `observed_epoch`
    ///
    /// Returns whether the entry was written.
    ///
    /// # Errors
    /// `CacheError::Unavailable` while marked down
    pub async fn insert_if_fresh(
        &self,
        fp: Fingerprint,
        tenant: TenantId,
        answer: CachedAnswer,
        observed_epoch: u64,
    ) -> Result<bool, CacheError> {
        self.check_up()?;
        let _shared = self.gate.read().await;

        if self.epoch() != observed_epoch {
            tracing::debug!(fingerprint = %fp.short(), observed_epoch, "stale answer not cached");
            return Ok(false);
        }

        let entry = Arc::new(CacheEntry {
            tenant,
            answer,
            stored_at: Utc::now(),
        });
        self.index.record(fp, &entry);
        self.entries.insert(fp, entry).await;
        Ok(true)
    }

    /// Apply an invalidation event
    ///
    /// When this returns, no later lookup can observe a removed entry, and
    /// no answer computed before the call can be written afterwards.
    pub async fn invalidate(&self, event: &InvalidationEvent) -> InvalidationReport {
        let _exclusive = self.gate.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let report = apply_steps(event.kind(), event.targets(), |target| {
            self.invalidate_target(target)
        })
        .await;

        tracing::info!(
            kind = event.kind(),
            success = report.success,
            invalidated = report.invalidated_count,
            "cache invalidation"
        );
        report
    }

    async fn invalidate_target(&self, target: InvalidationTarget) -> Result<u64, CacheError> {
        self.check_up()?;
        let mut removed = 0u64;
        for fp in self.index.take(target) {
            let cited = self.entries.get(&fp).await.is_some_and(|entry| entry.cites(target));
            if cited && self.entries.remove(&fp).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop every entry; returns the count dropped
    pub async fn clear_all(&self) -> u64 {
        let _exclusive = self.gate.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let keys: Vec<Fingerprint> = self.entries.iter().map(|(fp, _)| *fp).collect();
        let mut dropped = 0u64;
        for fp in keys {
            if self.entries.remove(&fp).await.is_some() {
                dropped += 1;
            }
        }
        self.index.clear();
        self.entries.run_pending_tasks().await;
        tracing::info!(dropped, "response cache cleared");
        dropped
    }

    pub fn mark_down(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%reason, "response cache marked down");
        *self.down.write() = Some(reason);
    }

    pub fn mark_up(&self) {
        *self.down.write() = None;
    }

    #[must_use]
    pub fn health(&self) -> CacheHealth {
        let reason = self.down.read().clone();
        CacheHealth {
            up: reason.is_none(),
            reason,
        }
    }

    /// Counters after flushing pending maintenance and pruning the indexes
    pub async fn stats(&self) -> ResponseCacheStats {
        self.entries.run_pending_tasks().await;
        self.index.prune(|fp| self.entries.contains_key(fp));
        ResponseCacheStats {
            entries: self.entries.entry_count(),
            tracked_sources: self.index.by_source.len(),
            tracked_intents: self.index.by_intent.len(),
            tracked_tenants: self.index.by_tenant.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            epoch: self.epoch(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.entry_count())
            .field("epoch", &self.epoch())
            .field("model_version", &self.model_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerKind, SourceRef};
    use concierge_model::{KnowledgeId, ProcedureId};

    fn answer(sources: &[SourceId], intents: &[u64]) -> CachedAnswer {
        CachedAnswer {
            answer: "answer".to_string(),
            kind: AnswerKind::Direct,
            sources: sources
                .iter()
                .map(|id| SourceRef {
                    id: *id,
                    label: id.to_string(),
                })
                .collect(),
            intents: intents.iter().copied().map(IntentId).collect(),
            intent_name: None,
            confidence: 0.9,
        }
    }

    async fn put(cache: &ResponseCache, tenant: u64, q: &str, sources: &[SourceId], intents: &[u64]) -> Fingerprint {
        let fp = cache.fingerprint(TenantId(tenant), q);
        let epoch = cache.epoch();
        assert!(cache
            .insert_if_fresh(fp, TenantId(tenant), answer(sources, intents), epoch)
            .await
            .unwrap());
        fp
    }

    const K1: SourceId = SourceId::Knowledge(KnowledgeId(1));
    const K2: SourceId = SourceId::Knowledge(KnowledgeId(2));
    const P1: SourceId = SourceId::Procedure(ProcedureId(1));

    #[tokio::test]
    async fn lookup_after_insert_hits() {
        let cache = ResponseCache::default();
        let fp = put(&cache, 1, "q", &[K1], &[]).await;
        let hit = cache.lookup(&fp).await.unwrap().unwrap();
        assert_eq!(hit.sources[0].id, K1);
        assert!(cache.lookup(&cache.fingerprint(TenantId(2), "q")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn knowledge_invalidation_is_idempotent() {
        let cache = ResponseCache::default();
        put(&cache, 1, "a", &[K1], &[]).await;
        put(&cache, 1, "b", &[K1, K2], &[]).await;
        let untouched = put(&cache, 1, "c", &[K2], &[]).await;

        let event = InvalidationEvent::KnowledgeUpdate {
            knowledge_id: KnowledgeId(1),
            related_intents: vec![],
        };
        let first = cache.invalidate(&event).await;
        assert!(first.success);
        assert_eq!(first.invalidated_count, 2);

        let second = cache.invalidate(&event).await;
        assert!(second.success);
        assert_eq!(second.invalidated_count, 0);

        assert!(cache.lookup(&untouched).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn related_intents_are_invalidated_without_double_counting() {
        let cache = ResponseCache::default();
        put(&cache, 1, "a", &[K1], &[5]).await;
        put(&cache, 1, "b", &[K2], &[5]).await;

        let report = cache
            .invalidate(&InvalidationEvent::KnowledgeUpdate {
                knowledge_id: KnowledgeId(1),
                related_intents: vec![IntentId(5)],
            })
            .await;
        assert_eq!(report.invalidated_count, 2);
    }

    #[tokio::test]
    async fn vendor_update_clears_only_that_tenant() {
        let cache = ResponseCache::default();
        put(&cache, 1, "a", &[K1], &[]).await;
        put(&cache, 1, "b", &[P1], &[]).await;
        let other = put(&cache, 2, "a", &[K1], &[]).await;

        let report = cache
            .invalidate(&InvalidationEvent::VendorUpdate { tenant: TenantId(1) })
            .await;
        assert_eq!(report.invalidated_count, 2);
        assert!(cache.lookup(&other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn procedure_update_targets_procedure_sources() {
        let cache = ResponseCache::default();
        let fp = put(&cache, 1, "a", &[P1], &[]).await;
        let report = cache
            .invalidate(&InvalidationEvent::ProcedureUpdate {
                procedure_id: ProcedureId(1),
            })
            .await;
        assert_eq!(report.invalidated_count, 1);
        assert!(cache.lookup(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recached_answer_is_only_invalidated_by_what_it_now_cites() {
        let cache = ResponseCache::default();
        put(&cache, 1, "q", &[K1], &[5]).await;
        let report = cache
            .invalidate(&InvalidationEvent::IntentUpdate {
                intent_ids: vec![IntentId(5)],
            })
            .await;
        assert_eq!(report.invalidated_count, 1);

        let fp = put(&cache, 1, "q", &[K2], &[]).await;
        let k1 = InvalidationEvent::KnowledgeUpdate {
            knowledge_id: KnowledgeId(1),
            related_intents: vec![],
        };
        assert_eq!(cache.invalidate(&k1).await.invalidated_count, 0);
        assert!(cache.lookup(&fp).await.unwrap().is_some());

        let k2 = InvalidationEvent::KnowledgeUpdate {
            knowledge_id: KnowledgeId(2),
            related_intents: vec![],
        };
        assert_eq!(cache.invalidate(&k2).await.invalidated_count, 1);
        assert!(cache.lookup(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn answer_computed_before_invalidation_is_discarded() {
        let cache = ResponseCache::default();
        let fp = cache.fingerprint(TenantId(1), "q");
        let observed = cache.epoch();

        cache
            .invalidate(&InvalidationEvent::IntentUpdate {
                intent_ids: vec![IntentId(9)],
            })
            .await;

        let written = cache
            .insert_if_fresh(fp, TenantId(1), answer(&[K1], &[]), observed)
            .await
            .unwrap();
        assert!(!written);
        assert!(cache.lookup(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn down_cache_fails_lookups_and_invalidation() {
        let cache = ResponseCache::default();
        put(&cache, 1, "a", &[K1], &[]).await;
        cache.mark_down("redis unreachable");

        assert!(!cache.health().up);
        assert_eq!(
            cache.lookup(&cache.fingerprint(TenantId(1), "a")).await,
            Err(CacheError::Unavailable("redis unreachable".to_string()))
        );
        let report = cache
            .invalidate(&InvalidationEvent::VendorUpdate { tenant: TenantId(1) })
            .await;
        assert!(!report.success);
        assert!(!report.partial);

        cache.mark_up();
        assert!(cache.health().up);
    }

    #[tokio::test]
    async fn clear_all_is_idempotent() {
        let cache = ResponseCache::default();
        let fp = put(&cache, 1, "a", &[K1], &[3]).await;
        cache.clear_all().await;
        assert!(cache.lookup(&fp).await.unwrap().is_none());
        assert_eq!(cache.clear_all().await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.tracked_sources, 0);
        assert_eq!(stats.epoch, 2);
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let cache = ResponseCache::default();
        let fp = put(&cache, 1, "a", &[K1], &[3]).await;
        tokio_test::assert_ok!(cache.lookup(&fp).await);
        tokio_test::assert_ok!(cache.lookup(&cache.fingerprint(TenantId(1), "zzz")).await);

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!((stats.tracked_sources, stats.tracked_intents, stats.tracked_tenants), (1, 1, 1));
    }
}
