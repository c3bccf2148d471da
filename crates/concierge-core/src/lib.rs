//! Concierge Core - the query-serving pipeline
//!
//! Routes a tenant's free-text question to an answer:
//! - two-stage intent classification (keywords, then a model)
//! - scope-filtered retrieval over knowledge and procedure items
//! - procedure triggers that open guided form sessions
//! - a confidence gate choosing direct, synthesized or unclear
//! - a semantic response cache with event-driven invalidation
//! - deduplication of questions nothing could answer
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_core::{ChatRequest, ConciergeConfig, QueryPipeline};
//! use concierge_model::TenantId;
//!
//! let pipeline = QueryPipeline::builder(ConciergeConfig::load("concierge.toml")?)
//!     .catalog(catalog)
//!     .embedder(embedder)
//!     .completion(completion)
//!     .build()?;
//!
//! let response = pipeline
//!     .answer(&ChatRequest::new(TenantId::new(1), "每月租金幾號要繳？"))
//!     .await?;
//! println!("{} ({:?})", response.answer, response.meta.outcome);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod gate;
pub mod intent;
pub mod pipeline;
pub mod retry;
pub mod stream;
pub mod synth;

pub use config::ConciergeConfig;
pub use error::{ConfigError, PipelineError, PipelineResult};
pub use gate::{ConfidenceGate, ConfidenceLevel, GateConfig, GateDecision, SynthesisSwitch};
pub use intent::{
    keyword_stage, parse_model_verdict, resolve_verdict, ClassificationStage, ClassifiedIntent,
    CompletionIntentModel, IntentClassifier, IntentConfig, IntentModel, IntentVerdict, KeywordHit,
    ModelIntent, ModelVerdict,
};
pub use pipeline::{
    AnswerOutcome, CacheStats, ChatRequest, ChatResponse, FormReply, QueryPipeline,
    QueryPipelineBuilder, ResponseMetadata, UnclearReason, UNCLEAR_ANSWER,
};
pub use retry::{ProviderConfig, RetryPolicy};
pub use stream::{chunk_answer, StreamEvent, CHUNK_CHARS};
pub use synth::AnswerSynthesizer;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for serving questions
    pub use crate::{
        AnswerOutcome, ChatRequest, ChatResponse, ConciergeConfig, PipelineError, PipelineResult,
        QueryPipeline, StreamEvent,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
