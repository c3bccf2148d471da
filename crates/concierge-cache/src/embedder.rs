//! Embedding vector cache
//!
//! Wraps an [`EmbeddingProvider`] so repeated texts skip the provider call.
//! Concurrent misses for the same text share one provider call.

use async_trait::async_trait;
use concierge_model::{Embedding, EmbeddingProvider, ProviderError};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// (model, blake3(text))
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EmbeddingKey {
    model: Arc<str>,
    text_hash: [u8; 32],
}

/// Embedding cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingCacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Caching decorator over an embedding provider
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    model: Arc<str>,
    cache: Cache<EmbeddingKey, Embedding>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    #[must_use]
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_entries: u64, ttl: Duration) -> Self {
        let model: Arc<str> = Arc::from(inner.model());
        Self {
            inner,
            model,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key(&self, text: &str) -> EmbeddingKey {
        EmbeddingKey {
            model: Arc::clone(&self.model),
            text_hash: *blake3::hash(text.as_bytes()).as_bytes(),
        }
    }

    /// Embed, reporting whether the vector came from the cache
    ///
    /// # Errors
    /// The provider's error on a miss; failures are not cached
    pub async fn embed_with_status(&self, text: &str) -> Result<(Embedding, bool), ProviderError> {
        let inner = Arc::clone(&self.inner);
        let owned = text.to_string();
        let entry = self
            .cache
            .entry(self.key(text))
            .or_try_insert_with(async move { inner.embed(&owned).await })
            .await
            .map_err(|err: Arc<ProviderError>| (*err).clone())?;

        let cached = !entry.is_fresh();
        if cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok((entry.into_value(), cached))
    }

    pub async fn stats(&self) -> EmbeddingCacheStats {
        self.cache.run_pending_tasks().await;
        EmbeddingCacheStats {
            entries: self.cache.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        self.embed_with_status(text).await.map(|(embedding, _)| embedding)
    }
}

impl std::fmt::Debug for CachedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("model", &self.model)
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model(&self) -> &str {
            "test-embed"
        }

        async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::unavailable("down"));
            }
            Ok(Embedding::new(vec![text.chars().count() as f32, 1.0]))
        }
    }

    fn embedder(fail: bool) -> (Arc<CountingEmbedder>, CachedEmbedder) {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail,
        });
        let cached = CachedEmbedder::new(inner.clone(), 100, Duration::from_secs(60));
        (inner, cached)
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (inner, cached) = embedder(false);
        let (first, was_cached) = cached.embed_with_status("租金").await.unwrap();
        assert!(!was_cached);
        let (second, was_cached) = cached.embed_with_status("租金").await.unwrap();
        assert!(was_cached);
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        let stats = cached.stats().await;
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let (inner, cached) = embedder(true);
        assert!(cached.embed("x").await.is_err());
        assert!(cached.embed("x").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn model_passes_through() {
        let (_, cached) = embedder(false);
        assert_eq!(cached.model(), "test-embed");
    }
}
