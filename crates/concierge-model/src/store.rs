//! Read-side catalog access
//!
//! [`CatalogStore`] is the seam to the admin subsystem's database.
//! [`InMemoryCatalog`] backs tests and the seed-file deployment mode.

use crate::catalog::{FormSchema, Intent, KnowledgeItem, ProcedureItem, TenantProfile};
use crate::error::{ModelError, StoreError};
use crate::ids::{FormId, TenantId};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Catalog read access used by the serving pipeline
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn tenant(&self, id: TenantId) -> Result<Option<TenantProfile>, StoreError>;

    /// Knowledge candidates for a tenant, including inactive items
    async fn knowledge(&self, tenant: TenantId) -> Result<Vec<Arc<KnowledgeItem>>, StoreError>;

    /// Procedure candidates for a tenant, including inactive items
    async fn procedures(&self, tenant: TenantId) -> Result<Vec<Arc<ProcedureItem>>, StoreError>;

    /// All intents, enabled or not
    async fn intents(&self) -> Result<Vec<Intent>, StoreError>;

    async fn form_schema(
        &self,
        tenant: TenantId,
        form: &FormId,
    ) -> Result<Option<Arc<FormSchema>>, StoreError>;
}

/// Serializable catalog snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub tenants: Vec<TenantProfile>,
    #[serde(default)]
    pub knowledge: Vec<KnowledgeItem>,
    #[serde(default)]
    pub procedures: Vec<ProcedureItem>,
    #[serde(default)]
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub forms: Vec<FormSchema>,
}

#[derive(Debug, Default)]
struct CatalogData {
    tenants: HashMap<TenantId, TenantProfile>,
    knowledge: HashMap<TenantId, Vec<Arc<KnowledgeItem>>>,
    procedures: HashMap<TenantId, Vec<Arc<ProcedureItem>>>,
    intents: Vec<Intent>,
    forms: HashMap<(TenantId, FormId), Arc<FormSchema>>,
}

/// In-memory catalog
///
/// Upserts replace by id. Can be switched offline to exercise the
/// store-unavailable paths.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
    offline: RwLock<Option<String>>,
}

impl InMemoryCatalog {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a seed, validating intents and forms
    ///
    /// # Errors
    /// First validation failure in the seed
    pub fn from_seed(seed: CatalogSeed) -> Result<Self, ModelError> {
        let catalog = Self::new();
        for tenant in seed.tenants {
            catalog.upsert_tenant(tenant);
        }
        for item in seed.knowledge {
            catalog.upsert_knowledge(item);
        }
        for item in seed.procedures {
            catalog.upsert_procedure(item);
        }
        for intent in seed.intents {
            catalog.upsert_intent(intent)?;
        }
        for form in seed.forms {
            if form.fields.is_empty() {
                return Err(ModelError::EmptyForm(form.id.to_string()));
            }
            catalog.upsert_form(form);
        }
        Ok(catalog)
    }

    pub fn upsert_tenant(&self, tenant: TenantProfile) {
        self.data.write().tenants.insert(tenant.id, tenant);
    }

    pub fn upsert_knowledge(&self, item: KnowledgeItem) {
        let mut data = self.data.write();
        let bucket = data.knowledge.entry(item.tenant).or_default();
        bucket.retain(|k| k.id != item.id);
        bucket.push(Arc::new(item));
    }

    pub fn upsert_procedure(&self, item: ProcedureItem) {
        let mut data = self.data.write();
        let bucket = data.procedures.entry(item.tenant).or_default();
        bucket.retain(|p| p.id != item.id);
        bucket.push(Arc::new(item));
    }

    /// # Errors
    /// Invalid confidence threshold
    pub fn upsert_intent(&self, intent: Intent) -> Result<(), ModelError> {
        intent.validate()?;
        let mut data = self.data.write();
        data.intents.retain(|i| i.id != intent.id);
        data.intents.push(intent);
        Ok(())
    }

    pub fn upsert_form(&self, form: FormSchema) {
        self.data
            .write()
            .forms
            .insert((form.tenant, form.id.clone()), Arc::new(form));
    }

    /// Make every read fail with `StoreError::Unavailable`
    pub fn set_offline(&self, reason: impl Into<String>) {
        *self.offline.write() = Some(reason.into());
    }

    pub fn set_online(&self) {
        *self.offline.write() = None;
    }

    fn check_online(&self) -> Result<(), StoreError> {
        match self.offline.read().as_ref() {
            Some(reason) => Err(StoreError::unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn tenant(&self, id: TenantId) -> Result<Option<TenantProfile>, StoreError> {
        self.check_online()?;
        Ok(self.data.read().tenants.get(&id).cloned())
    }

    async fn knowledge(&self, tenant: TenantId) -> Result<Vec<Arc<KnowledgeItem>>, StoreError> {
        self.check_online()?;
        Ok(self
            .data
            .read()
            .knowledge
            .get(&tenant)
            .cloned()
            .unwrap_or_default())
    }

    async fn procedures(&self, tenant: TenantId) -> Result<Vec<Arc<ProcedureItem>>, StoreError> {
        self.check_online()?;
        Ok(self
            .data
            .read()
            .procedures
            .get(&tenant)
            .cloned()
            .unwrap_or_default())
    }

    async fn intents(&self) -> Result<Vec<Intent>, StoreError> {
        self.check_online()?;
        Ok(self.data.read().intents.clone())
    }

    async fn form_schema(
        &self,
        tenant: TenantId,
        form: &FormId,
    ) -> Result<Option<Arc<FormSchema>>, StoreError> {
        self.check_online()?;
        Ok(self.data.read().forms.get(&(tenant, form.clone())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BusinessScope;
    use crate::embedding::Embedding;
    use crate::ids::KnowledgeId;

    fn knowledge(id: u64, tenant: u64, answer: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: KnowledgeId(id),
            tenant: TenantId(tenant),
            question_summary: format!("q{id}"),
            answer: answer.to_string(),
            keywords: vec![],
            audience: None,
            embedding: Embedding::new(vec![1.0, 0.0]),
            active: true,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_knowledge(knowledge(1, 1, "old"));
        catalog.upsert_knowledge(knowledge(1, 1, "new"));
        catalog.upsert_knowledge(knowledge(2, 2, "other tenant"));

        let items = catalog.knowledge(TenantId(1)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].answer, "new");
    }

    #[tokio::test]
    async fn offline_reads_fail() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_tenant(TenantProfile::new(TenantId(1), "t", BusinessScope::External));
        catalog.set_offline("maintenance");
        assert!(matches!(
            catalog.tenant(TenantId(1)).await,
            Err(StoreError::Unavailable(_))
        ));
        catalog.set_online();
        assert!(catalog.tenant(TenantId(1)).await.unwrap().is_some());
    }

    #[test]
    fn seed_rejects_invalid_intent() {
        let seed = CatalogSeed {
            intents: vec![Intent::new(crate::ids::IntentId(1), "x", &[]).with_threshold(2.0)],
            ..CatalogSeed::default()
        };
        assert!(InMemoryCatalog::from_seed(seed).is_err());
    }
}
