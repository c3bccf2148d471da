//! Two-stage intent classifier
//!
//! Stage one counts keyword containment per enabled intent. When the best
//! keyword hit does not clear the configured bar, stage two asks a model
//! (normally the completion provider) for a primary intent and secondaries,
//! then filters them by each intent's own confidence threshold.

use crate::error::PipelineError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use concierge_model::{
    normalize_question, CatalogStore, ChatMessage, CompletionProvider, CompletionRequest, Intent,
    IntentId, ProviderError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Classifier tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Keyword matches the best intent needs to skip the model stage
    pub min_keyword_matches: usize,
    /// Fraction of the best intent's keywords that must match
    pub min_keyword_coverage: f64,
    pub max_secondary: usize,
    /// A failed primary stays as a secondary when its confidence reaches
    /// this fraction of its threshold
    pub demote_ratio: f64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            min_keyword_matches: 1,
            min_keyword_coverage: 0.2,
            max_secondary: 2,
            demote_ratio: 0.8,
        }
    }
}

/// Stage that produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStage {
    Keyword,
    Model,
    Unmatched,
}

/// One classified intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub id: IntentId,
    pub name: String,
    pub confidence: f64,
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentVerdict {
    pub primary: Option<ClassifiedIntent>,
    /// Never contains the primary; unique by id
    pub secondary: Vec<ClassifiedIntent>,
    pub stage: ClassificationStage,
}

impl IntentVerdict {
    #[must_use]
    pub fn unmatched() -> Self {
        Self {
            primary: None,
            secondary: Vec::new(),
            stage: ClassificationStage::Unmatched,
        }
    }

    /// Primary confidence, 0 when unmatched
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.primary.as_ref().map_or(0.0, |p| p.confidence)
    }

    /// Primary first, then secondaries
    #[must_use]
    pub fn ids(&self) -> Vec<IntentId> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .map(|c| c.id)
            .collect()
    }

    #[must_use]
    pub fn primary_name(&self) -> Option<&str> {
        self.primary.as_ref().map(|p| p.name.as_str())
    }
}

/// Keyword-stage result for one intent
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub intent: Intent,
    pub matches: usize,
    /// `matches / keywords.len()`
    pub coverage: f64,
}

/// Count keyword containment per enabled intent
///
/// Hits are ranked by match count, then priority (higher first), then id.
#[must_use]
pub fn keyword_stage(question: &str, intents: &[Intent]) -> Vec<KeywordHit> {
    let normalized = normalize_question(question);
    let mut hits: Vec<KeywordHit> = intents
        .iter()
        .filter(|i| i.enabled && !i.keywords.is_empty())
        .filter_map(|intent| {
            let matches = intent
                .keywords
                .iter()
                .map(|k| normalize_question(k))
                .filter(|k| !k.is_empty() && normalized.contains(k.as_str()))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let coverage = matches as f64 / intent.keywords.len() as f64;
            (matches > 0).then(|| KeywordHit {
                intent: intent.clone(),
                matches,
                coverage,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.matches
            .cmp(&a.matches)
            .then(b.intent.priority.cmp(&a.intent.priority))
            .then(a.intent.id.cmp(&b.intent.id))
    });
    hits
}

fn keyword_verdict(hits: &[KeywordHit], max_secondary: usize) -> IntentVerdict {
    let mut ranked = hits.iter().map(|h| ClassifiedIntent {
        id: h.intent.id,
        name: h.intent.name.clone(),
        confidence: h.coverage,
    });
    let Some(primary) = ranked.next() else {
        return IntentVerdict::unmatched();
    };
    IntentVerdict {
        primary: Some(primary),
        secondary: ranked.take(max_secondary).collect(),
        stage: ClassificationStage::Keyword,
    }
}

/// Intent named by a model, before threshold filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIntent {
    pub name: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Raw model answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelVerdict {
    #[serde(rename = "primary_intent", default)]
    pub primary: Option<ModelIntent>,
    #[serde(rename = "secondary_intents", default)]
    pub secondary: Vec<ModelIntent>,
}

/// Second-stage classifier
#[async_trait]
pub trait IntentModel: Send + Sync {
    async fn classify(&self, question: &str, intents: &[Intent]) -> Result<ModelVerdict, ProviderError>;
}

/// Map a model answer onto enabled intents and apply their thresholds
///
/// Unknown names are dropped. When the primary fails its threshold the best
/// passing secondary is promoted; the old primary is kept as a secondary if
/// it reached `demote_ratio` of its threshold.
#[must_use]
pub fn resolve_verdict(raw: &ModelVerdict, intents: &[Intent], config: &IntentConfig) -> IntentVerdict {
    let by_name: HashMap<&str, &Intent> = intents
        .iter()
        .filter(|i| i.enabled)
        .map(|i| (i.name.trim(), i))
        .collect();
    let classify = |m: &ModelIntent| {
        by_name.get(m.name.trim()).map(|intent| {
            (
                ClassifiedIntent {
                    id: intent.id,
                    name: intent.name.clone(),
                    confidence: m.confidence,
                },
                intent.confidence_threshold,
            )
        })
    };

    let primary = raw.primary.as_ref().and_then(classify);
    let mut passing: Vec<ClassifiedIntent> = Vec::new();
    let mut demoted: Option<ClassifiedIntent> = None;
    for (candidate, threshold) in raw.secondary.iter().filter_map(classify) {
        if candidate.confidence >= threshold {
            passing.push(candidate);
        }
    }

    let primary = match primary {
        Some((p, threshold)) if p.confidence >= threshold => Some(p),
        Some((p, threshold)) => {
            passing.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));
            if passing.is_empty() {
                None
            } else {
                if p.confidence >= threshold * config.demote_ratio {
                    demoted = Some(p);
                }
                Some(passing.remove(0))
            }
        }
        None => {
            passing.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));
            if passing.is_empty() {
                None
            } else {
                Some(passing.remove(0))
            }
        }
    };

    let Some(primary) = primary else {
        return IntentVerdict::unmatched();
    };

    let mut secondary: Vec<ClassifiedIntent> = Vec::new();
    for candidate in demoted.into_iter().chain(passing) {
        if candidate.id != primary.id && secondary.iter().all(|s| s.id != candidate.id) {
            secondary.push(candidate);
        }
    }
    secondary.truncate(config.max_secondary);

    IntentVerdict {
        primary: Some(primary),
        secondary,
        stage: ClassificationStage::Model,
    }
}

/// Model stage backed by a completion provider returning JSON
pub struct CompletionIntentModel {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
}

impl CompletionIntentModel {
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    fn request(question: &str, intents: &[Intent]) -> CompletionRequest {
        let catalog: String = intents
            .iter()
            .filter(|i| i.enabled)
            .map(|i| format!("- {}: {}\n", i.name, i.keywords.join("、")))
            .collect();
        let system = "你是物業管理客服的意圖分類器。只能從清單中挑選意圖名稱，並只回傳 JSON：\
            {\"primary_intent\": {\"name\": \"...\", \"confidence\": 0.0} 或 null, \
            \"secondary_intents\": [{\"name\": \"...\", \"confidence\": 0.0}]}";
        let user = format!("意圖清單:\n{catalog}\n問題: {question}");
        CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .with_temperature(0.0)
            .with_max_tokens(300)
    }
}

/// Parse a model reply, tolerating code fences and surrounding prose
///
/// # Errors
/// `ProviderError::InvalidResponse` when no JSON object parses
pub fn parse_model_verdict(reply: &str) -> Result<ModelVerdict, ProviderError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(ProviderError::invalid_response("no JSON object in intent reply")),
    };
    serde_json::from_str(body).map_err(|err| ProviderError::invalid_response(format!("intent reply: {err}")))
}

#[async_trait]
impl IntentModel for CompletionIntentModel {
    async fn classify(&self, question: &str, intents: &[Intent]) -> Result<ModelVerdict, ProviderError> {
        let request = Self::request(question, intents);
        let reply = self
            .retry
            .run("intent", || self.provider.complete(&request))
            .await?;
        parse_model_verdict(&reply)
    }
}

impl std::fmt::Debug for CompletionIntentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionIntentModel")
            .field("model", &self.provider.model())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Keyword stage, then the model stage when keywords are inconclusive
pub struct IntentClassifier {
    catalog: Arc<dyn CatalogStore>,
    model: Option<Arc<dyn IntentModel>>,
    config: IntentConfig,
}

impl IntentClassifier {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>, config: IntentConfig) -> Self {
        Self {
            catalog,
            model: None,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn IntentModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Classify one question
    ///
    /// A failing model stage falls back to the keyword hits.
    ///
    /// # Errors
    /// `PipelineError::StoreUnavailable` when intents cannot be loaded
    pub async fn classify(&self, question: &str) -> Result<IntentVerdict, PipelineError> {
        let intents: Vec<Intent> = self
            .catalog
            .intents()
            .await?
            .into_iter()
            .filter(|i| i.enabled)
            .collect();

        let hits = keyword_stage(question, &intents);
        let conclusive = hits.first().is_some_and(|best| {
            best.matches >= self.config.min_keyword_matches
                && best.coverage >= self.config.min_keyword_coverage
        });
        if conclusive {
            let verdict = keyword_verdict(&hits, self.config.max_secondary);
            tracing::debug!(intent = ?verdict.primary_name(), stage = "keyword", "intent classified");
            return Ok(verdict);
        }

        let Some(model) = &self.model else {
            return Ok(keyword_verdict(&hits, self.config.max_secondary));
        };

        let raw = match model.classify(question, &intents).await {
            Ok(raw) => raw,
            Err(err) => {
                let verdict = keyword_verdict(&hits, self.config.max_secondary);
                tracing::warn!(%err, intent = ?verdict.primary_name(), "intent model unavailable, keeping keyword hits");
                return Ok(verdict);
            }
        };
        let verdict = resolve_verdict(&raw, &intents, &self.config);
        tracing::debug!(
            intent = ?verdict.primary_name(),
            confidence = verdict.confidence(),
            secondary = verdict.secondary.len(),
            stage = "model",
            "intent classified"
        );
        Ok(verdict)
    }
}

impl std::fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("config", &self.config)
            .field("has_model", &self.model.is_some())
            .finish_non_exhaustive()
    }
}
