//! Concierge Retrieval - scope-filtered similarity search
//!
//! Two corpora are searched for every question:
//! - knowledge items, one embedding each
//! - procedure (SOP) items, a primary embedding of the short label and a
//!   fallback embedding of the full content
//!
//! Candidates whose audience falls outside the tenant's business scope never
//! reach scoring.
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_retrieval::{Retriever, RetrievalConfig, ScopeTable};
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn concierge_model::CatalogStore>,
//! #     tenant: concierge_model::TenantProfile,
//! #     query: concierge_model::Embedding) -> Result<(), Box<dyn std::error::Error>> {
//! let retriever = Retriever::new(store, Arc::new(ScopeTable::standard()), RetrievalConfig::new());
//! let set = retriever.retrieve(&tenant, &query).await?;
//! if let Some(top) = set.top() {
//!     println!("{} scored {:.3}", top.label(), top.score);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod retriever;
pub mod scope;

pub use retriever::{
    procedure_score, rank_knowledge, rank_order, rank_procedures, Candidate, CandidateSource,
    DualEmbeddingPolicy, MatchedEmbedding, RetrievalConfig, RetrievalSet, Retriever,
};
pub use scope::{ScopeError, ScopeFilter, ScopeTable};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
