//! Catalog records owned by the admin subsystem
//!
//! The serving pipeline only reads these. Edits made on the admin side are
//! announced to the pipeline through cache invalidation events.

use crate::embedding::Embedding;
use crate::error::ModelError;
use crate::ids::{FormId, IntentId, KnowledgeId, ProcedureId, SourceId, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Tenant service model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BusinessScope {
    /// Consumer-facing (tenants, landlords)
    External,
    /// Staff-facing (property managers, administrators)
    Internal,
}

impl BusinessScope {
    pub const ALL: [Self; 2] = [Self::External, Self::Internal];

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Internal => "internal",
        }
    }
}

impl FromStr for BusinessScope {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" => Ok(Self::External),
            "internal" => Ok(Self::Internal),
            other => Err(ModelError::UnknownScope(other.to_string())),
        }
    }
}

impl TryFrom<String> for BusinessScope {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BusinessScope> for String {
    fn from(scope: BusinessScope) -> Self {
        scope.as_str().to_string()
    }
}

impl Display for BusinessScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant as seen by the serving pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub id: TenantId,
    pub name: String,
    pub scope: BusinessScope,
    /// Per-tenant synthesis default; `None` defers to the global flag
    #[serde(default)]
    pub synthesis_enabled: Option<bool>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TenantProfile {
    #[inline]
    #[must_use]
    pub fn new(id: TenantId, name: impl Into<String>, scope: BusinessScope) -> Self {
        Self {
            id,
            name: name.into(),
            scope,
            synthesis_enabled: None,
            active: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_synthesis(mut self, enabled: bool) -> Self {
        self.synthesis_enabled = Some(enabled);
        self
    }
}

/// Free-form knowledge item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: KnowledgeId,
    pub tenant: TenantId,
    pub question_summary: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Audience tag; `None` is universal
    #[serde(default)]
    pub audience: Option<String>,
    pub embedding: Embedding,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl KnowledgeItem {
    #[inline]
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        SourceId::Knowledge(self.id)
    }
}

/// How a procedure decides it should start its follow-up form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TriggerMode {
    /// Lexical containment of any keyword in the question
    Keyword { keywords: Vec<String> },
    /// Classified intent (primary or secondary) among `intent_ids`
    Intent { intent_ids: Vec<IntentId> },
    /// Whenever the procedure is the top-ranked source
    Always,
}

/// Structured procedure (SOP) item with dual embeddings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProcedureRecord")]
pub struct ProcedureItem {
    pub id: ProcedureId,
    pub tenant: TenantId,
    pub item_name: String,
    pub content: String,
    pub group: Option<String>,
    pub audience: Option<String>,
    /// Embedding of the short label
    pub primary_embedding: Option<Embedding>,
    /// Embedding of the full content
    pub fallback_embedding: Option<Embedding>,
    pub trigger: Option<TriggerMode>,
    pub next_form_id: Option<FormId>,
    pub active: bool,
}

#[derive(Deserialize)]
struct ProcedureRecord {
    id: ProcedureId,
    tenant: TenantId,
    item_name: String,
    content: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default)]
    primary_embedding: Option<Embedding>,
    #[serde(default)]
    fallback_embedding: Option<Embedding>,
    #[serde(default)]
    trigger: Option<TriggerMode>,
    #[serde(default)]
    next_form_id: Option<FormId>,
    #[serde(default = "default_true")]
    active: bool,
}

impl TryFrom<ProcedureRecord> for ProcedureItem {
    type Error = ModelError;

    fn try_from(r: ProcedureRecord) -> Result<Self, Self::Error> {
        let mut item = Self::new(
            r.id,
            r.tenant,
            r.item_name,
            r.content,
            r.primary_embedding,
            r.fallback_embedding,
        )?;
        item.group = r.group;
        item.audience = r.audience;
        item.trigger = r.trigger;
        item.next_form_id = r.next_form_id;
        item.active = r.active;
        Ok(item)
    }
}

impl ProcedureItem {
    /// Create an active procedure with no trigger
    ///
    /// # Errors
    /// `ModelError::MissingProcedureEmbedding` when both embeddings are absent
    pub fn new(
        id: ProcedureId,
        tenant: TenantId,
        item_name: impl Into<String>,
        content: impl Into<String>,
        primary_embedding: Option<Embedding>,
        fallback_embedding: Option<Embedding>,
    ) -> Result<Self, ModelError> {
        if primary_embedding.is_none() && fallback_embedding.is_none() {
            return Err(ModelError::MissingProcedureEmbedding(id.get()));
        }
        Ok(Self {
            id,
            tenant,
            item_name: item_name.into(),
            content: content.into(),
            group: None,
            audience: None,
            primary_embedding,
            fallback_embedding,
            trigger: None,
            next_form_id: None,
            active: true,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerMode, next_form_id: Option<FormId>) -> Self {
        self.trigger = Some(trigger);
        self.next_form_id = next_form_id;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        SourceId::Procedure(self.id)
    }
}

/// Intent category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Answered from the knowledge base
    Knowledge,
    /// Answered by calling a backend API
    Api,
}

/// Classifiable intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub name: String,
    pub kind: IntentKind,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_intent_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

impl Intent {
    #[must_use]
    pub fn new(id: IntentId, name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id,
            name: name.into(),
            kind: IntentKind::Knowledge,
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            confidence_threshold: default_intent_threshold(),
            enabled: true,
            priority: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check the threshold is a probability
    ///
    /// # Errors
    /// `ModelError::InvalidThreshold` when outside [0, 1]
    pub fn validate(&self) -> Result<(), ModelError> {
        if (0.0..=1.0).contains(&self.confidence_threshold) {
            Ok(())
        } else {
            Err(ModelError::InvalidThreshold {
                id: self.id.get(),
                threshold: self.confidence_threshold.to_string(),
            })
        }
    }
}

/// Validation applied to a collected form value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    /// Taiwan mobile or landline number
    Phone,
    Email,
    /// Taiwan national id with checksum
    TaiwanId,
}

/// One field of a guided form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl FormField {
    #[must_use]
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            kind,
            required: true,
            min_length: None,
            max_length: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }
}

/// Static field list for a guided data-collection flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: FormId,
    pub tenant: TenantId,
    pub name: String,
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub completion_message: Option<String>,
}

impl FormSchema {
    /// # Errors
    /// `ModelError::EmptyForm` when `fields` is empty
    pub fn new(
        id: FormId,
        tenant: TenantId,
        name: impl Into<String>,
        fields: Vec<FormField>,
    ) -> Result<Self, ModelError> {
        if fields.is_empty() {
            return Err(ModelError::EmptyForm(id.to_string()));
        }
        Ok(Self {
            id,
            tenant,
            name: name.into(),
            fields,
            completion_message: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FormField> {
        self.fields.get(index)
    }
}

fn default_true() -> bool {
    true
}

fn default_intent_threshold() -> f64 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parse_rejects_unknown() {
        assert_eq!(
            "External".parse::<BusinessScope>().unwrap(),
            BusinessScope::External
        );
        assert!(matches!(
            "b2b".parse::<BusinessScope>(),
            Err(ModelError::UnknownScope(_))
        ));
    }

    #[test]
    fn procedure_requires_an_embedding() {
        let err = ProcedureItem::new(ProcedureId(5), TenantId(1), "n", "c", None, None);
        assert_eq!(err, Err(ModelError::MissingProcedureEmbedding(5)));

        let ok = ProcedureItem::new(
            ProcedureId(5),
            TenantId(1),
            "n",
            "c",
            None,
            Some(Embedding::new(vec![1.0])),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn procedure_deserialize_enforces_embedding_invariant() {
        let missing = r#"{"id":1,"tenant":1,"item_name":"a","content":"b"}"#;
        assert!(serde_json::from_str::<ProcedureItem>(missing).is_err());

        let present = r#"{"id":1,"tenant":1,"item_name":"a","content":"b",
            "primary_embedding":[1.0,0.0],
            "trigger":{"mode":"keyword","keywords":["報修"]},
            "next_form_id":"repair_request"}"#;
        let item: ProcedureItem = serde_json::from_str(present).unwrap();
        assert!(item.active);
        assert_eq!(item.next_form_id, Some(FormId::new("repair_request")));
        assert!(matches!(item.trigger, Some(TriggerMode::Keyword { .. })));
    }

    #[test]
    fn intent_defaults_and_validation() {
        let intent: Intent =
            serde_json::from_str(r#"{"id":3,"name":"rent","kind":"knowledge"}"#).unwrap();
        assert!(intent.enabled);
        assert!((intent.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert!(intent.validate().is_ok());
        assert!(intent.with_threshold(1.5).validate().is_err());
    }

    #[test]
    fn tenant_scope_from_yaml() {
        let tenant: TenantProfile =
            serde_yaml::from_str("id: 1\nname: demo\nscope: internal\n").unwrap();
        assert_eq!(tenant.scope, BusinessScope::Internal);
        assert!(serde_yaml::from_str::<TenantProfile>("id: 1\nname: d\nscope: partner\n").is_err());
    }

    #[test]
    fn empty_form_rejected() {
        let err = FormSchema::new(FormId::new("x"), TenantId(1), "x", vec![]);
        assert!(matches!(err, Err(ModelError::EmptyForm(_))));
    }
}
