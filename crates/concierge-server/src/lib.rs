//! Concierge Server - the HTTP face of the query pipeline
//!
//! Wires a [`QueryPipeline`] to OpenAI-compatible providers and a YAML
//! catalog seed, then serves it with warp.
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_server::{http, providers::EndpointConfig, seed};
//!
//! let catalog = seed::load_catalog("catalog.yaml")?;
//! let embedder = HttpEmbedder::new(EndpointConfig::new(url, "text-embedding-3-small"))?;
//! let pipeline = Arc::new(
//!     QueryPipeline::builder(config).catalog(Arc::new(catalog)).embedder(Arc::new(embedder)).build()?,
//! );
//! http::serve(pipeline, "0.0.0.0:8080".parse()?, shutdown).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod http;
pub mod providers;
pub mod seed;
pub mod telemetry;

use chrono::Utc;
use concierge_core::QueryPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub use http::{routes, serve};
pub use providers::{EndpointConfig, HttpCompletion, HttpEmbedder};
pub use seed::{load_catalog, parse_seed};
pub use telemetry::init_tracing;

/// Periodically cancel form sessions nobody answered
///
/// The task runs until aborted.
pub fn spawn_form_sweeper(pipeline: Arc<QueryPipeline>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = pipeline.expire_idle_forms(Utc::now());
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "expired idle form sessions");
            }
        }
    })
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
