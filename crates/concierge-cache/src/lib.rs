//! Concierge Cache - semantic response cache with event-driven invalidation
//!
//! Provides:
//! - [`ResponseCache`]: fingerprint-keyed answers with TTL, reverse indexes
//!   and an invalidation epoch
//! - [`InvalidationEvent`]: typed admin events and their wire form
//! - [`CachedEmbedder`]: provider-side embedding cache keyed by (model, text hash)
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_cache::{CacheConfig, InvalidationEvent, ResponseCache};
//! use concierge_model::KnowledgeId;
//!
//! # async fn example() {
//! let cache = ResponseCache::new(&CacheConfig::default());
//! let report = cache
//!     .invalidate(&InvalidationEvent::KnowledgeUpdate {
//!         knowledge_id: KnowledgeId::new(42),
//!         related_intents: vec![],
//!     })
//!     .await;
//! assert!(report.success);
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod answer;
pub mod embedder;
pub mod error;
pub mod invalidation;
pub mod response;

pub use answer::{AnswerKind, CachedAnswer, SourceRef};
pub use embedder::{CachedEmbedder, EmbeddingCacheStats};
pub use error::{CacheError, InvalidationError};
pub use invalidation::{
    apply_steps, InvalidationEvent, InvalidationReport, InvalidationRequest, InvalidationTarget,
};
pub use response::{CacheConfig, CacheHealth, ResponseCache, ResponseCacheStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
