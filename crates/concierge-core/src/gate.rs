//! Confidence gate
//!
//! Decides, from the complete retrieval set, whether a question is unclear,
//! answered directly from the top source, or composed from several sources.

use concierge_retrieval::{Candidate, RetrievalSet};
use serde::{Deserialize, Serialize};

/// Gate thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Below this top score the question is unclear
    pub min_threshold: f64,
    /// Per-source bar for synthesis eligibility
    pub synthesis_threshold: f64,
    /// Eligible sources needed before synthesis is attempted
    pub synthesis_min_results: usize,
    /// Global synthesis default
    pub synthesis_enabled: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_threshold: 0.6,
            synthesis_threshold: 0.8,
            synthesis_min_results: 2,
            synthesis_enabled: false,
        }
    }
}

impl GateConfig {
    #[inline]
    #[must_use]
    pub fn with_min_threshold(mut self, threshold: f64) -> Self {
        self.min_threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_synthesis(mut self, enabled: bool) -> Self {
        self.synthesis_enabled = enabled;
        self
    }
}

/// The three inputs that decide whether synthesis may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynthesisSwitch {
    pub global: bool,
    pub tenant: Option<bool>,
    /// Explicit per-request override
    pub request: Option<bool>,
}

impl SynthesisSwitch {
    /// Request override, else tenant default, else global flag
    #[inline]
    #[must_use]
    pub fn resolve(self) -> bool {
        self.request.or(self.tenant).unwrap_or(self.global)
    }
}

/// Coarse confidence band of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::High
        } else if score >= 0.70 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Gate outcome
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Nothing cleared `min_threshold`; carries the best score seen
    Unclear { top_score: Option<f64> },
    /// Sources at or above `synthesis_threshold`, best first
    Synthesize { sources: Vec<Candidate> },
    Direct { source: Candidate },
}

impl GateDecision {
    #[inline]
    #[must_use]
    pub fn is_unclear(&self) -> bool {
        matches!(self, Self::Unclear { .. })
    }
}

/// Threshold state machine over a retrieval set
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceGate {
    config: GateConfig,
}

impl ConfidenceGate {
    #[inline]
    #[must_use]
    pub const fn new(config: GateConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide over the merged, ranked set
    #[must_use]
    pub fn decide(&self, set: &RetrievalSet, synthesis_enabled: bool) -> GateDecision {
        let merged = set.merged();
        let Some(top) = merged.first() else {
            return GateDecision::Unclear { top_score: None };
        };
        if top.score < self.config.min_threshold {
            return GateDecision::Unclear {
                top_score: Some(top.score),
            };
        }

        if synthesis_enabled {
            let eligible: Vec<Candidate> = merged
                .iter()
                .filter(|c| c.score >= self.config.synthesis_threshold)
                .cloned()
                .collect();
            if eligible.len() >= self.config.synthesis_min_results {
                return GateDecision::Synthesize { sources: eligible };
            }
        }

        GateDecision::Direct { source: top.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_model::{Embedding, KnowledgeId, KnowledgeItem, TenantId};
    use concierge_retrieval::{CandidateSource, MatchedEmbedding};
    use std::sync::Arc;

    fn candidate(id: u64, score: f64) -> Candidate {
        Candidate {
            source: CandidateSource::Knowledge(Arc::new(KnowledgeItem {
                id: KnowledgeId(id),
                tenant: TenantId(1),
                question_summary: format!("q{id}"),
                answer: format!("a{id}"),
                keywords: Vec::new(),
                audience: None,
                embedding: Embedding::new(vec![1.0]),
                active: true,
            })),
            score,
            matched: MatchedEmbedding::Single,
        }
    }

    fn set(scores: &[f64]) -> RetrievalSet {
        RetrievalSet {
            knowledge: scores
                .iter()
                .enumerate()
                .map(|(i, s)| candidate(i as u64 + 1, *s))
                .collect(),
            procedures: Vec::new(),
        }
    }

    #[test]
    fn min_threshold_boundary_is_inclusive() {
        let gate = ConfidenceGate::new(GateConfig::default());
        assert!(matches!(gate.decide(&set(&[0.6]), false), GateDecision::Direct { .. }));
        let below = 0.6 - 1e-9;
        assert_eq!(
            gate.decide(&set(&[below]), false),
            GateDecision::Unclear {
                top_score: Some(below)
            }
        );
        assert_eq!(gate.decide(&set(&[]), true), GateDecision::Unclear { top_score: None });
    }

    #[test]
    fn synthesis_needs_enough_eligible_sources() {
        let gate = ConfidenceGate::new(GateConfig::default());
        match gate.decide(&set(&[0.95, 0.8, 0.7]), true) {
            GateDecision::Synthesize { sources } => {
                let scores: Vec<f64> = sources.iter().map(|c| c.score).collect();
                assert_eq!(scores, vec![0.95, 0.8]);
            }
            other => panic!("expected synthesis, got {other:?}"),
        }
        assert!(matches!(
            gate.decide(&set(&[0.95, 0.79]), true),
            GateDecision::Direct { .. }
        ));
        assert!(matches!(
            gate.decide(&set(&[0.95, 0.9]), false),
            GateDecision::Direct { .. }
        ));
    }

    #[test]
    fn override_always_wins() {
        for global in [false, true] {
            for tenant in [None, Some(false), Some(true)] {
                for request in [false, true] {
                    let switch = SynthesisSwitch {
                        global,
                        tenant,
                        request: Some(request),
                    };
                    assert_eq!(switch.resolve(), request);
                }
            }
        }
        let tenant_wins = SynthesisSwitch {
            global: true,
            tenant: Some(false),
            request: None,
        };
        assert!(!tenant_wins.resolve());
        assert!(SynthesisSwitch {
            global: true,
            ..SynthesisSwitch::default()
        }
        .resolve());
    }

    #[test]
    fn confidence_bands() {
        assert_eq!(ConfidenceLevel::from_score(0.85), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.69), ConfidenceLevel::Low);
    }
}
