//! Concierge Model - shared vocabulary of the query-serving pipeline
//!
//! Provides:
//! - Strongly-typed ids for catalog records and pipeline-minted records
//! - Catalog records (knowledge items, dual-embedding procedures, intents, forms)
//! - Embeddings with cosine similarity
//! - Question normalisation and cache [`Fingerprint`]s
//! - Provider seams for the external embedding and completion models
//! - The [`CatalogStore`] read seam and an in-memory implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_model::{Fingerprint, TenantId};
//!
//! let fp = Fingerprint::compute(TenantId::new(1), "每月租金幾號要繳？", "v1");
//! println!("cache key {}", fp.short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod embedding;
pub mod error;
pub mod ids;
pub mod provider;
pub mod store;
pub mod text;

pub use catalog::{
    BusinessScope, FieldKind, FormField, FormSchema, Intent, IntentKind, KnowledgeItem,
    ProcedureItem, TenantProfile, TriggerMode,
};
pub use embedding::{cosine_similarity, Embedding};
pub use error::{ModelError, StoreError};
pub use ids::{
    FormId, IntentId, KnowledgeId, ProcedureId, SessionId, SourceId, TenantId, UnclearId, UserId,
};
pub use provider::{
    ChatMessage, CompletionProvider, CompletionRequest, EmbeddingProvider, ProviderError, Role,
};
pub use store::{CatalogSeed, CatalogStore, InMemoryCatalog};
pub use text::{normalize_question, Fingerprint};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the concierge model
    pub use crate::{
        BusinessScope, CatalogStore, CompletionProvider, Embedding, EmbeddingProvider,
        Fingerprint, IntentId, KnowledgeItem, ProcedureId, ProcedureItem, SourceId, TenantId,
        TenantProfile,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
