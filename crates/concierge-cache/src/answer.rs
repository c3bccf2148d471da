//! Cacheable answers
//!
//! Only answers that cleared the confidence gate are representable; an
//! unclear outcome has no `CachedAnswer` form.

use concierge_model::{IntentId, SourceId};
use serde::{Deserialize, Serialize};

/// How the answer text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Top source returned verbatim
    Direct,
    /// Composed from several sources by the completion provider
    Synthesized,
}

/// Attributed source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: SourceId,
    pub label: String,
}

/// Cache value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub answer: String,
    pub kind: AnswerKind,
    pub sources: Vec<SourceRef>,
    /// Classified intents (primary first)
    pub intents: Vec<IntentId>,
    pub intent_name: Option<String>,
    /// Top retrieval score
    pub confidence: f64,
}
