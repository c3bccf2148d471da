//! Catalog seed files
//!
//! The admin subsystem owns the catalog; the service reads a YAML snapshot
//! of it at startup.

use anyhow::Context;
use concierge_model::{CatalogSeed, InMemoryCatalog};
use std::path::Path;

/// Parse a YAML seed
///
/// # Errors
/// Malformed YAML, a procedure without embeddings, or an invalid intent or form
pub fn parse_seed(raw: &str) -> anyhow::Result<CatalogSeed> {
    serde_yaml::from_str(raw).context("invalid catalog seed")
}

/// Read and validate a YAML seed into an in-memory catalog
///
/// # Errors
/// Unreadable file, or any error of [`parse_seed`]
pub fn load_catalog(path: impl AsRef<Path>) -> anyhow::Result<InMemoryCatalog> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read seed {}", path.display()))?;
    let seed = parse_seed(&raw).with_context(|| format!("seed {}", path.display()))?;

    tracing::info!(
        tenants = seed.tenants.len(),
        knowledge = seed.knowledge.len(),
        procedures = seed.procedures.len(),
        intents = seed.intents.len(),
        forms = seed.forms.len(),
        "catalog seed loaded"
    );
    InMemoryCatalog::from_seed(seed).context("catalog seed failed validation")
}
