//! Concierge Dedup - unclear-question deduplication
//!
//! Questions the pipeline could not answer are folded into frequency-counted
//! records so reviewers see one row per underlying question. Matching runs
//! four ordered layers and stops at the first one with a hit:
//!
//! 1. exact match on normalised text
//! 2. edit distance ≤ 2
//! 3. semantic similarity ≥ 0.80, or edit distance ≤ 2
//! 4. semantic similarity in [0.60, 0.80) confirmed by pinyin similarity ≥ 0.80
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_dedup::{DedupConfig, Deduplicator, InMemoryUnclearStore};
//! use std::sync::Arc;
//!
//! # async fn example(embedder: Arc<dyn concierge_model::EmbeddingProvider>) -> Result<(), Box<dyn std::error::Error>> {
//! let dedup = Deduplicator::new(Arc::new(InMemoryUnclearStore::new()), embedder, DedupConfig::default());
//! let outcome = dedup.record(concierge_model::TenantId::new(1), "每月租金幾號要繳", None).await?;
//! println!("frequency {}", outcome.record.frequency);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod dedup;
pub mod distance;
pub mod layers;
pub mod phonetic;
pub mod store;

pub use dedup::{DedupConfig, DedupError, DedupOutcome, Deduplicator};
pub use distance::{levenshtein, normalized_similarity};
pub use layers::{find_match, Evidence, LayerThresholds, MatchLayer, Probe};
pub use phonetic::{phonetic_similarity, PhoneticEncoder, PinyinEncoder};
pub use store::{InMemoryUnclearStore, UnclearQuestion, UnclearQuestionStore, UnclearStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
