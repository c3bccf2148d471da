//! Query pipeline
//!
//! Wires every stage together for one question:
//!
//! 1. an active form session for the user consumes the message first
//! 2. response cache lookup by fingerprint
//! 3. embedding and intent classification, concurrently
//! 4. scope-filtered retrieval over both corpora
//! 5. procedure triggers, then the confidence gate
//! 6. unclear questions go to the deduplicator; answers go to the cache
//!
//! Every collaborator is injected through [`QueryPipelineBuilder`].

use crate::config::ConciergeConfig;
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::gate::{ConfidenceGate, ConfidenceLevel, GateDecision, SynthesisSwitch};
use crate::intent::{CompletionIntentModel, IntentClassifier, IntentModel, IntentVerdict};
use crate::retry::RetryPolicy;
use crate::synth::AnswerSynthesizer;
use chrono::{DateTime, Utc};
use concierge_cache::{
    AnswerKind, CacheHealth, CachedAnswer, CachedEmbedder, EmbeddingCacheStats, InvalidationEvent,
    InvalidationReport, InvalidationRequest, ResponseCache, ResponseCacheStats, SourceRef,
};
use concierge_dedup::{Deduplicator, InMemoryUnclearStore, UnclearQuestion, UnclearQuestionStore, UnclearStatus};
use concierge_forms::{
    CancelReason, CompletionSink, FormError, FormSession, FormSessionManager, FormState, ProcedureTrigger,
    SessionStart, StepOutcome, SubmitResult, TracingSink,
};
use concierge_model::{
    CatalogStore, CompletionProvider, EmbeddingProvider, FormId, IntentId, SessionId, TenantId,
    TenantProfile, UnclearId, UserId,
};
use concierge_retrieval::{Candidate, RetrievalSet, Retriever};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Reply when no source is confident enough
pub const UNCLEAR_ANSWER: &str = "抱歉，目前找不到這個問題的明確答案，我們已記錄下來並會儘快補充。";

/// One chat question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub vendor_id: TenantId,
    pub question: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Forces synthesis on or off; for trusted callers such as backtests
    #[serde(default)]
    pub synthesis_override: Option<bool>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(vendor_id: TenantId, question: impl Into<String>) -> Self {
        Self {
            vendor_id,
            question: question.into(),
            user_id: None,
            synthesis_override: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = Some(user);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_synthesis_override(mut self, enabled: bool) -> Self {
        self.synthesis_override = Some(enabled);
        self
    }
}

/// Which path produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Direct,
    Synthesized,
    /// A procedure trigger fired
    Procedure,
    /// The message was consumed by an active form session
    Form,
    Unclear,
}

impl From<AnswerKind> for AnswerOutcome {
    fn from(kind: AnswerKind) -> Self {
        match kind {
            AnswerKind::Direct => Self::Direct,
            AnswerKind::Synthesized => Self::Synthesized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclearReason {
    NoMatch,
    /// The embedding provider failed after retries
    ProviderUnavailable,
}

/// Form session state attached to a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormReply {
    pub session_id: SessionId,
    pub form: FormId,
    pub state: FormState,
    pub current_field_index: usize,
    pub resumed: bool,
    /// Present when the message was a step of the session
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub step: Option<StepOutcome>,
}

impl FormReply {
    fn started(start: &SessionStart) -> Self {
        Self {
            session_id: start.session.id,
            form: start.session.key.form.clone(),
            state: start.session.state,
            current_field_index: start.session.current_field_index,
            resumed: start.resumed,
            step: None,
        }
    }

    fn stepped(result: &SubmitResult) -> Self {
        Self {
            session_id: result.session.id,
            form: result.session.key.form.clone(),
            state: result.session.state,
            current_field_index: result.session.current_field_index,
            resumed: true,
            step: Some(result.outcome.clone()),
        }
    }
}

/// Everything about an answer except its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub outcome: AnswerOutcome,
    pub source_count: usize,
    pub sources: Vec<SourceRef>,
    /// Primary intent name
    pub intent: Option<String>,
    pub intent_ids: Vec<IntentId>,
    /// Top retrieval score behind the answer
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub form: Option<FormReply>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unclear_reason: Option<UnclearReason>,
}

/// Answer text plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(flatten)]
    pub meta: ResponseMetadata,
}

impl ChatResponse {
    fn answered(answer: CachedAnswer, cached: bool) -> Self {
        Self {
            meta: ResponseMetadata {
                outcome: answer.kind.into(),
                source_count: answer.sources.len(),
                sources: answer.sources,
                intent: answer.intent_name,
                intent_ids: answer.intents,
                confidence: answer.confidence,
                confidence_level: ConfidenceLevel::from_score(answer.confidence),
                cached,
                form: None,
                unclear_reason: None,
            },
            answer: answer.answer,
        }
    }

    fn unclear(verdict: &IntentVerdict, top_score: Option<f64>, reason: UnclearReason) -> Self {
        let confidence = top_score.unwrap_or(0.0);
        Self {
            answer: UNCLEAR_ANSWER.to_string(),
            meta: ResponseMetadata {
                outcome: AnswerOutcome::Unclear,
                source_count: 0,
                sources: Vec::new(),
                intent: verdict.primary_name().map(str::to_string),
                intent_ids: verdict.ids(),
                confidence,
                confidence_level: ConfidenceLevel::from_score(confidence),
                cached: false,
                form: None,
                unclear_reason: Some(reason),
            },
        }
    }

    fn procedure(candidate: &Candidate, verdict: &IntentVerdict, start: Option<&SessionStart>) -> Self {
        let answer = match start {
            Some(start) => format!("{}\n\n{}", candidate.body(), start.prompt),
            None => candidate.body().to_string(),
        };
        Self {
            answer,
            meta: ResponseMetadata {
                outcome: AnswerOutcome::Procedure,
                source_count: 1,
                sources: vec![source_ref(candidate)],
                intent: verdict.primary_name().map(str::to_string),
                intent_ids: verdict.ids(),
                confidence: candidate.score,
                confidence_level: ConfidenceLevel::from_score(candidate.score),
                cached: false,
                form: start.map(FormReply::started),
                unclear_reason: None,
            },
        }
    }

    fn form_step(result: &SubmitResult) -> Self {
        let answer = match &result.outcome {
            StepOutcome::Accepted { next_prompt } => next_prompt.clone(),
            StepOutcome::Rejected { rejection, prompt, .. } => format!("{rejection}，{prompt}"),
            StepOutcome::Completed { message, .. } => message
                .clone()
                .unwrap_or_else(|| "資料已填寫完成，謝謝您！".to_string()),
            StepOutcome::Cancelled { reason } => match reason {
                CancelReason::UserCancelled => "已取消填寫。".to_string(),
                CancelReason::RetryLimit => "輸入錯誤次數過多，已取消填寫，請稍後再試。".to_string(),
                CancelReason::Idle => "填寫逾時，已取消。".to_string(),
            },
        };
        Self {
            answer,
            meta: ResponseMetadata {
                outcome: AnswerOutcome::Form,
                source_count: 0,
                sources: Vec::new(),
                intent: None,
                intent_ids: Vec::new(),
                confidence: 1.0,
                confidence_level: ConfidenceLevel::High,
                cached: false,
                form: Some(FormReply::stepped(result)),
                unclear_reason: None,
            },
        }
    }
}

fn source_ref(candidate: &Candidate) -> SourceRef {
    SourceRef {
        id: candidate.id(),
        label: candidate.label().to_string(),
    }
}

fn cached_answer(kind: AnswerKind, answer: String, sources: &[Candidate], verdict: &IntentVerdict) -> CachedAnswer {
    CachedAnswer {
        answer,
        kind,
        sources: sources.iter().map(source_ref).collect(),
        intents: verdict.ids(),
        intent_name: verdict.primary_name().map(str::to_string),
        confidence: sources.first().map_or(0.0, |c| c.score),
    }
}

/// Counters of both cache categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub response: ResponseCacheStats,
    pub embedding: EmbeddingCacheStats,
}

/// The query-serving pipeline
pub struct QueryPipeline {
    config: ConciergeConfig,
    catalog: Arc<dyn CatalogStore>,
    embedder: Arc<CachedEmbedder>,
    retriever: Retriever,
    classifier: IntentClassifier,
    gate: ConfidenceGate,
    synthesizer: Option<AnswerSynthesizer>,
    trigger: ProcedureTrigger,
    cache: ResponseCache,
    dedup: Deduplicator,
    forms: FormSessionManager,
    retry: RetryPolicy,
}

impl QueryPipeline {
    #[inline]
    #[must_use]
    pub fn builder(config: ConciergeConfig) -> QueryPipelineBuilder {
        QueryPipelineBuilder::new(config)
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConciergeConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn forms(&self) -> &FormSessionManager {
        &self.forms
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Answer one question
    ///
    /// Provider failures degrade: a failed embedding gives an unclear answer
    /// (still recorded for review), a failed intent model leaves the keyword
    /// hits, and a failed synthesis answers from the top source. Store
    /// failures are returned.
    ///
    /// # Errors
    /// `InvalidRequest` for a blank question or unknown tenant,
    /// `StoreUnavailable` when the catalog, cache or unclear store is down
    #[tracing::instrument(skip_all, fields(tenant = %request.vendor_id))]
    pub async fn answer(&self, request: &ChatRequest) -> PipelineResult<ChatResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(PipelineError::invalid("question is empty"));
        }
        let tenant = self.active_tenant(request.vendor_id).await?;

        if let Some(user) = &request.user_id {
            if let Some(response) = self.continue_form(tenant.id, user, question).await? {
                return Ok(response);
            }
        }

        // Overridden requests neither read nor write the shared cache.
        let use_cache = request.synthesis_override.is_none();
        let fingerprint = self.cache.fingerprint(tenant.id, question);
        if use_cache {
            if let Some(hit) = self.cache.lookup(&fingerprint).await? {
                tracing::info!(outcome = ?hit.kind, fingerprint = %fingerprint.short(), "answered from cache");
                return Ok(ChatResponse::answered(hit, true));
            }
        }
        let epoch = self.cache.epoch();

        let (embedded, classified) = tokio::join!(
            self.retry.run("embed", || self.embedder.embed(question)),
            self.classifier.classify(question)
        );
        let verdict = classified?;
        let embedding = match embedded {
            Ok(embedding) => embedding,
            Err(err) => {
                let suggested = verdict.primary.as_ref().map(|p| p.id);
                let recorded = self
                    .dedup
                    .record_with_embedding(tenant.id, question, None, suggested)
                    .await?;
                tracing::warn!(
                    %err,
                    outcome = "unclear",
                    record = %recorded.record.id,
                    merged_by = ?recorded.merged_by(),
                    "embedding unavailable"
                );
                return Ok(ChatResponse::unclear(&verdict, None, UnclearReason::ProviderUnavailable));
            }
        };

        let set = self.retriever.retrieve(&tenant, &embedding).await?;

        if let Some(response) = self
            .fire_procedure(&tenant, request, question, &set, &verdict)
            .await?
        {
            return Ok(response);
        }

        let switch = SynthesisSwitch {
            global: self.config.gate.synthesis_enabled,
            tenant: tenant.synthesis_enabled,
            request: request.synthesis_override,
        };
        let synthesis = switch.resolve() && self.synthesizer.is_some();

        let answer = match self.gate.decide(&set, synthesis) {
            GateDecision::Unclear { top_score } => {
                let suggested = verdict.primary.as_ref().map(|p| p.id);
                let recorded = self
                    .dedup
                    .record_with_embedding(tenant.id, question, Some(embedding), suggested)
                    .await?;
                tracing::info!(
                    outcome = "unclear",
                    ?top_score,
                    record = %recorded.record.id,
                    frequency = recorded.record.frequency,
                    merged_by = ?recorded.merged_by(),
                    "no confident source"
                );
                return Ok(ChatResponse::unclear(&verdict, top_score, UnclearReason::NoMatch));
            }
            GateDecision::Synthesize { sources } => self.synthesize_or_direct(question, &sources, &verdict).await,
            GateDecision::Direct { source } => cached_answer(
                AnswerKind::Direct,
                source.body().to_string(),
                std::slice::from_ref(&source),
                &verdict,
            ),
        };

        if use_cache {
            match self
                .cache
                .insert_if_fresh(fingerprint, tenant.id, answer.clone(), epoch)
                .await
            {
                Ok(written) => tracing::debug!(written, epoch, "answer cache write"),
                Err(err) => tracing::warn!(%err, "answer not cached"),
            }
        }

        tracing::info!(
            outcome = ?answer.kind,
            sources = answer.sources.len(),
            confidence = answer.confidence,
            intent = ?answer.intent_name,
            "question answered"
        );
        Ok(ChatResponse::answered(answer, false))
    }

    async fn active_tenant(&self, id: TenantId) -> PipelineResult<TenantProfile> {
        match self.catalog.tenant(id).await? {
            Some(tenant) if tenant.active => Ok(tenant),
            Some(_) => Err(PipelineError::invalid(format!("tenant {id} is inactive"))),
            None => Err(PipelineError::invalid(format!("unknown tenant {id}"))),
        }
    }

    async fn continue_form(
        &self,
        tenant: TenantId,
        user: &UserId,
        message: &str,
    ) -> PipelineResult<Option<ChatResponse>> {
        for key in self.forms.active_for_user(tenant, user) {
            match self.forms.submit(&key, message).await {
                Ok(result) => return Ok(Some(ChatResponse::form_step(&result))),
                // Ended by another message or by expiry in the meantime
                Err(FormError::NoSession(_) | FormError::SessionClosed(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    async fn fire_procedure(
        &self,
        tenant: &TenantProfile,
        request: &ChatRequest,
        question: &str,
        set: &RetrievalSet,
        verdict: &IntentVerdict,
    ) -> PipelineResult<Option<ChatResponse>> {
        let top = set.top().map(|c| c.id());
        let classified = verdict.ids();
        let min = self.gate.config().min_threshold;

        for candidate in set.procedures.iter().filter(|c| c.score >= min) {
            let Some(procedure) = candidate.as_procedure() else {
                continue;
            };
            let is_top = top == Some(candidate.id());
            let Some(fire) = self.trigger.evaluate(procedure, question, &classified, is_top) else {
                continue;
            };

            let start = match (fire.next_form, &request.user_id) {
                (Some(form), Some(user)) => {
                    match self.forms.start_or_resume(tenant.id, user.clone(), form).await {
                        Ok(start) => Some(start),
                        Err(FormError::UnknownForm(form)) => {
                            tracing::warn!(procedure = %procedure.id, %form, "procedure names a missing form");
                            None
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                _ => None,
            };

            tracing::info!(
                outcome = "procedure",
                procedure = %procedure.id,
                fired_by = ?fire.fired_by,
                score = candidate.score,
                form = start.is_some(),
                "procedure triggered"
            );
            return Ok(Some(ChatResponse::procedure(candidate, verdict, start.as_ref())));
        }
        Ok(None)
    }

    async fn synthesize_or_direct(
        &self,
        question: &str,
        sources: &[Candidate],
        verdict: &IntentVerdict,
    ) -> CachedAnswer {
        let top = sources.get(..1).unwrap_or(&[]);
        let direct = || {
            let body = top.first().map(|c| c.body().to_string()).unwrap_or_default();
            cached_answer(AnswerKind::Direct, body, top, verdict)
        };

        let Some(synthesizer) = &self.synthesizer else {
            return direct();
        };
        match synthesizer.synthesize(question, sources).await {
            Ok(text) => cached_answer(AnswerKind::Synthesized, text, sources, verdict),
            Err(err) => {
                tracing::warn!(%err, sources = sources.len(), "synthesis failed, answering from top source");
                direct()
            }
        }
    }

    /// Apply a wire invalidation request
    ///
    /// # Errors
    /// `InvalidRequest` for an unknown type or a missing id; nothing is
    /// invalidated in that case
    pub async fn invalidate(&self, request: InvalidationRequest) -> PipelineResult<InvalidationReport> {
        let event = InvalidationEvent::try_from(request)?;
        Ok(self.invalidate_event(&event).await)
    }

    pub async fn invalidate_event(&self, event: &InvalidationEvent) -> InvalidationReport {
        self.cache.invalidate(event).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            response: self.cache.stats().await,
            embedding: self.embedder.stats().await,
        }
    }

    #[must_use]
    pub fn cache_health(&self) -> CacheHealth {
        self.cache.health()
    }

    /// Drop every response and embedding entry; returns response entries dropped
    pub async fn clear_cache(&self) -> u64 {
        self.embedder.clear();
        self.cache.clear_all().await
    }

    /// Unclear questions of a tenant, most frequent first
    ///
    /// # Errors
    /// `StoreUnavailable` when the unclear store is down
    pub async fn unclear_questions(
        &self,
        tenant: TenantId,
        status: Option<UnclearStatus>,
    ) -> PipelineResult<Vec<UnclearQuestion>> {
        Ok(self.dedup.store().list(tenant, status).await?)
    }

    /// # Errors
    /// `InvalidRequest` for an unknown id, `StoreUnavailable` when the store is down
    pub async fn set_unclear_status(&self, id: UnclearId, status: UnclearStatus) -> PipelineResult<UnclearQuestion> {
        Ok(self.dedup.store().set_status(id, status).await?)
    }

    /// Cancel form sessions idle past the configured timeout
    pub fn expire_idle_forms(&self, now: DateTime<Utc>) -> Vec<FormSession> {
        self.forms.expire_idle(now)
    }
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("config", &self.config)
            .field("synthesizer", &self.synthesizer)
            .field("forms", &self.forms.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`QueryPipeline`]
///
/// A catalog and an embedding provider are required. Without a completion
/// provider synthesis is off and intent classification is keyword-only.
pub struct QueryPipelineBuilder {
    config: ConciergeConfig,
    catalog: Option<Arc<dyn CatalogStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    intent_model: Option<Arc<dyn IntentModel>>,
    unclear_store: Option<Arc<dyn UnclearQuestionStore>>,
    sink: Option<Arc<dyn CompletionSink>>,
}

impl QueryPipelineBuilder {
    #[must_use]
    pub fn new(config: ConciergeConfig) -> Self {
        Self {
            config,
            catalog: None,
            embedder: None,
            completion: None,
            intent_model: None,
            unclear_store: None,
            sink: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[inline]
    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Used for synthesis, and for the intent model stage unless
    /// [`Self::intent_model`] is set
    #[inline]
    #[must_use]
    pub fn completion(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    #[inline]
    #[must_use]
    pub fn intent_model(mut self, model: Arc<dyn IntentModel>) -> Self {
        self.intent_model = Some(model);
        self
    }

    #[inline]
    #[must_use]
    pub fn unclear_store(mut self, store: Arc<dyn UnclearQuestionStore>) -> Self {
        self.unclear_store = Some(store);
        self
    }

    #[inline]
    #[must_use]
    pub fn completion_sink(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and assemble the pipeline
    ///
    /// # Errors
    /// `PipelineError::Config` for invalid configuration or a missing
    /// catalog or embedder
    pub fn build(self) -> PipelineResult<QueryPipeline> {
        let config = self.config;
        config.validate()?;

        let catalog = self
            .catalog
            .ok_or_else(|| ConfigError::invalid("pipeline.catalog", "a catalog store is required"))?;
        let raw_embedder = self
            .embedder
            .ok_or_else(|| ConfigError::invalid("pipeline.embedder", "an embedding provider is required"))?;

        let retry = RetryPolicy::from(config.provider);
        let embedder = Arc::new(CachedEmbedder::new(
            raw_embedder,
            config.cache.embedding_max_entries,
            Duration::from_secs(config.cache.embedding_ttl_secs),
        ));

        let retriever = Retriever::new(
            Arc::clone(&catalog),
            Arc::new(config.scope_table()?),
            config.retrieval,
        );

        let intent_model = self.intent_model.or_else(|| {
            self.completion
                .clone()
                .map(|provider| Arc::new(CompletionIntentModel::new(provider, retry)) as Arc<dyn IntentModel>)
        });
        let mut classifier = IntentClassifier::new(Arc::clone(&catalog), config.intent);
        if let Some(model) = intent_model {
            classifier = classifier.with_model(model);
        }

        let synthesizer = self
            .completion
            .map(|provider| AnswerSynthesizer::new(provider, retry));

        let unclear = self
            .unclear_store
            .unwrap_or_else(|| Arc::new(InMemoryUnclearStore::new()));
        let dedup = Deduplicator::new(
            unclear,
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
            config.dedup,
        );

        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let forms = FormSessionManager::new(Arc::clone(&catalog), sink, config.forms);

        tracing::info!(
            top_k = config.retrieval.top_k,
            min_threshold = config.gate.min_threshold,
            synthesis = config.gate.synthesis_enabled,
            synthesizer = synthesizer.is_some(),
            "query pipeline ready"
        );

        Ok(QueryPipeline {
            gate: ConfidenceGate::new(config.gate),
            cache: ResponseCache::new(&config.cache),
            trigger: ProcedureTrigger,
            config,
            catalog,
            embedder,
            retriever,
            classifier,
            synthesizer,
            dedup,
            forms,
            retry,
        })
    }
}

impl std::fmt::Debug for QueryPipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipelineBuilder")
            .field("config", &self.config)
            .field("catalog", &self.catalog.is_some())
            .field("embedder", &self.embedder.is_some())
            .field("completion", &self.completion.is_some())
            .finish_non_exhaustive()
    }
}
