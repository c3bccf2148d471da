//! Question normalisation and cache fingerprints

use crate::ids::TenantId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Normalise a question for exact comparison and fingerprinting
///
/// Folds full-width ASCII forms (common in CJK input methods) to half-width,
/// lowercases, trims, and collapses whitespace runs to a single space.
#[must_use]
pub fn normalize_question(raw: &str) -> String {
    let folded = raw.chars().map(fold_width).flat_map(char::to_lowercase);

    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in folded {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

fn fold_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// Deterministic cache key for a (tenant, question, model version) triple
///
/// Blake3 over the tenant id, the normalised question and the answer-model
/// version, each field length-delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint; `question` is normalised here
    #[must_use]
    pub fn compute(tenant: TenantId, question: &str, model_version: &str) -> Self {
        let normalized = normalize_question(question);
        let mut hasher = blake3::Hasher::new();
        hasher.update(&tenant.get().to_le_bytes());
        hasher.update(&(normalized.len() as u64).to_le_bytes());
        hasher.update(normalized.as_bytes());
        hasher.update(&(model_version.len() as u64).to_le_bytes());
        hasher.update(model_version.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
