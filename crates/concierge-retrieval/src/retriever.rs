//! Dual-source knowledge/procedure retriever
//!
//! Scores the query embedding against both corpora, applies the scope,
//! tenant and active filters, then ranks by score descending with the source
//! id as tie-break. Procedures carry two embeddings; how they combine is the
//! [`DualEmbeddingPolicy`].

use crate::scope::{ScopeFilter, ScopeTable};
use concierge_model::{
    CatalogStore, Embedding, KnowledgeItem, ProcedureItem, SourceId, StoreError, TenantId,
    TenantProfile,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// How a procedure's primary and fallback similarities combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DualEmbeddingPolicy {
    /// `max(primary, fallback)`, a missing embedding counting as 0
    #[default]
    Greatest,
    /// Primary similarity when the primary embedding exists, else fallback
    PrimaryFirst,
}

/// Retriever tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates kept per corpus
    pub top_k: usize,
    pub dual_policy: DualEmbeddingPolicy,
}

impl RetrievalConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dual_policy(mut self, policy: DualEmbeddingPolicy) -> Self {
        self.dual_policy = policy;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            dual_policy: DualEmbeddingPolicy::Greatest,
        }
    }
}

/// Which stored embedding produced the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedEmbedding {
    /// Knowledge items carry one embedding
    Single,
    Primary,
    Fallback,
}

/// Retrieved item
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSource {
    Knowledge(Arc<KnowledgeItem>),
    Procedure(Arc<ProcedureItem>),
}

/// Scored retrieval candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: CandidateSource,
    pub score: f64,
    pub matched: MatchedEmbedding,
}

impl Candidate {
    #[must_use]
    pub fn id(&self) -> SourceId {
        match &self.source {
            CandidateSource::Knowledge(k) => k.source_id(),
            CandidateSource::Procedure(p) => p.source_id(),
        }
    }

    /// Short human label (question summary or procedure name)
    #[must_use]
    pub fn label(&self) -> &str {
        match &self.source {
            CandidateSource::Knowledge(k) => &k.question_summary,
            CandidateSource::Procedure(p) => &p.item_name,
        }
    }

    /// Answer body returned verbatim on a direct answer
    #[must_use]
    pub fn body(&self) -> &str {
        match &self.source {
            CandidateSource::Knowledge(k) => &k.answer,
            CandidateSource::Procedure(p) => &p.content,
        }
    }

    #[must_use]
    pub fn as_procedure(&self) -> Option<&Arc<ProcedureItem>> {
        match &self.source {
            CandidateSource::Procedure(p) => Some(p),
            CandidateSource::Knowledge(_) => None,
        }
    }
}

/// Rank order: score descending, then source id ascending
#[must_use]
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.id().cmp(&b.id()))
}

/// Complete result of one retrieval pass over both corpora
#[derive(Debug, Clone, Default)]
pub struct RetrievalSet {
    pub knowledge: Vec<Candidate>,
    pub procedures: Vec<Candidate>,
}

impl RetrievalSet {
    /// Both corpora merged in rank order
    #[must_use]
    pub fn merged(&self) -> Vec<Candidate> {
        let mut all: Vec<Candidate> = self
            .knowledge
            .iter()
            .chain(self.procedures.iter())
            .cloned()
            .collect();
        all.sort_by(rank_order);
        all
    }

    #[must_use]
    pub fn top(&self) -> Option<Candidate> {
        self.knowledge
            .iter()
            .chain(self.procedures.iter())
            .min_by(|a, b| rank_order(a, b))
            .cloned()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.knowledge.is_empty() && self.procedures.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.knowledge.len() + self.procedures.len()
    }
}

/// Score, filter and rank knowledge items
#[must_use]
pub fn rank_knowledge(
    items: &[Arc<KnowledgeItem>],
    tenant: TenantId,
    filter: ScopeFilter<'_>,
    query: &Embedding,
    top_k: usize,
) -> Vec<Candidate> {
    let mut scored: Vec<Candidate> = items
        .iter()
        .filter(|k| filter.allows(k.audience.as_deref()))
        .filter(|k| k.tenant == tenant && k.active)
        .map(|k| Candidate {
            score: query.cosine(&k.embedding),
            matched: MatchedEmbedding::Single,
            source: CandidateSource::Knowledge(Arc::clone(k)),
        })
        .collect();
    scored.sort_by(rank_order);
    scored.truncate(top_k);
    scored
}

/// Effective procedure score under `policy`
#[must_use]
pub fn procedure_score(
    item: &ProcedureItem,
    query: &Embedding,
    policy: DualEmbeddingPolicy,
) -> (f64, MatchedEmbedding) {
    let primary = item.primary_embedding.as_ref().map(|e| query.cosine(e));
    let fallback = item.fallback_embedding.as_ref().map(|e| query.cosine(e));

    match policy {
        DualEmbeddingPolicy::Greatest => {
            let score = primary.unwrap_or(0.0).max(fallback.unwrap_or(0.0));
            let matched = match (primary, fallback) {
                (Some(p), Some(f)) if f > p => MatchedEmbedding::Fallback,
                (None, Some(_)) => MatchedEmbedding::Fallback,
                _ => MatchedEmbedding::Primary,
            };
            (score, matched)
        }
        DualEmbeddingPolicy::PrimaryFirst => match (primary, fallback) {
            (Some(p), _) => (p, MatchedEmbedding::Primary),
            (None, Some(f)) => (f, MatchedEmbedding::Fallback),
            (None, None) => (0.0, MatchedEmbedding::Primary),
        },
    }
}

/// Score, filter and rank procedure items
#[must_use]
pub fn rank_procedures(
    items: &[Arc<ProcedureItem>],
    tenant: TenantId,
    filter: ScopeFilter<'_>,
    query: &Embedding,
    config: RetrievalConfig,
) -> Vec<Candidate> {
    let mut scored: Vec<Candidate> = items
        .iter()
        .filter(|p| filter.allows(p.audience.as_deref()))
        .filter(|p| p.tenant == tenant && p.active)
        .map(|p| {
            let (score, matched) = procedure_score(p, query, config.dual_policy);
            Candidate {
                score,
                matched,
                source: CandidateSource::Procedure(Arc::clone(p)),
            }
        })
        .collect();
    scored.sort_by(rank_order);
    scored.truncate(config.top_k);
    scored
}

/// Retriever over a [`CatalogStore`]
pub struct Retriever {
    store: Arc<dyn CatalogStore>,
    scopes: Arc<ScopeTable>,
    config: RetrievalConfig,
}

impl Retriever {
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>, scopes: Arc<ScopeTable>, config: RetrievalConfig) -> Self {
        Self {
            store,
            scopes,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> RetrievalConfig {
        self.config
    }

    /// Retrieve from both corpora
    ///
    /// The two corpus loads run concurrently; the returned set is only built
    /// once both have completed.
    ///
    /// # Errors
    /// `StoreError` from either corpus load
    pub async fn retrieve(
        &self,
        tenant: &TenantProfile,
        query: &Embedding,
    ) -> Result<RetrievalSet, StoreError> {
        let (knowledge, procedures) = futures::try_join!(
            self.store.knowledge(tenant.id),
            self.store.procedures(tenant.id)
        )?;

        let filter = self.scopes.filter(tenant.scope);
        let set = RetrievalSet {
            knowledge: rank_knowledge(&knowledge, tenant.id, filter, query, self.config.top_k),
            procedures: rank_procedures(&procedures, tenant.id, filter, query, self.config),
        };

        tracing::debug!(
            tenant = %tenant.id,
            knowledge = set.knowledge.len(),
            procedures = set.procedures.len(),
            top = set.top().map(|c| c.score),
            "retrieval complete"
        );
        Ok(set)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
