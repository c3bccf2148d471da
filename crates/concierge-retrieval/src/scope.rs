//! Business scope filter
//!
//! Maps a tenant's service model to the audience tags its users may see.
//! The mapping is closed: both scopes must be present and no other scope name
//! is accepted when loading it from configuration.

use concierge_model::{BusinessScope, ModelError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Scope table loading errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error(transparent)]
    UnknownScope(#[from] ModelError),

    #[error("scope table has no entry for {0}")]
    MissingScope(BusinessScope),

    #[error("scope {0} lists an empty audience tag")]
    EmptyAudience(BusinessScope),
}

/// Closed business-scope to audience allow-list mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTable {
    allow: BTreeMap<BusinessScope, BTreeSet<String>>,
}

impl ScopeTable {
    /// Production mapping
    ///
    /// Compound tags such as `租客|管理師` are distinct audience values and are
    /// listed explicitly wherever they are visible.
    #[must_use]
    pub fn standard() -> Self {
        let external = [
            "租客",
            "房東",
            "tenant",
            "general",
            "租客|管理師",
            "房東|租客",
            "房東|租客|管理師",
        ];
        let internal = [
            "管理師",
            "系統管理員",
            "general",
            "租客|管理師",
            "房東|租客|管理師",
            "房東/管理師",
        ];

        let mut allow = BTreeMap::new();
        allow.insert(
            BusinessScope::External,
            external.iter().map(|s| (*s).to_string()).collect(),
        );
        allow.insert(
            BusinessScope::Internal,
            internal.iter().map(|s| (*s).to_string()).collect(),
        );
        Self { allow }
    }

    /// Build from a string-keyed configuration table
    ///
    /// # Errors
    /// - `ScopeError::UnknownScope` for a key other than `external`/`internal`
    /// - `ScopeError::MissingScope` when a scope has no entry
    /// - `ScopeError::EmptyAudience` for blank tags
    pub fn from_config(raw: &HashMap<String, Vec<String>>) -> Result<Self, ScopeError> {
        let mut allow = BTreeMap::new();
        for (name, tags) in raw {
            let scope: BusinessScope = name.parse()?;
            let mut set = BTreeSet::new();
            for tag in tags {
                let tag = tag.trim();
                if tag.is_empty() {
                    return Err(ScopeError::EmptyAudience(scope));
                }
                set.insert(tag.to_string());
            }
            allow.insert(scope, set);
        }

        for scope in BusinessScope::ALL {
            if !allow.contains_key(&scope) {
                return Err(ScopeError::MissingScope(scope));
            }
        }

        Ok(Self { allow })
    }

    /// Allow-list for a scope
    #[must_use]
    pub fn allow_list(&self, scope: BusinessScope) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.allow.get(&scope).unwrap_or(&EMPTY)
    }

    /// Filter bound to one scope
    #[inline]
    #[must_use]
    pub fn filter(&self, scope: BusinessScope) -> ScopeFilter<'_> {
        ScopeFilter {
            allowed: self.allow_list(scope),
        }
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Audience predicate for one tenant scope
#[derive(Debug, Clone, Copy)]
pub struct ScopeFilter<'a> {
    allowed: &'a BTreeSet<String>,
}

impl ScopeFilter<'_> {
    /// `None` is universal and always allowed
    #[inline]
    #[must_use]
    pub fn allows(&self, audience: Option<&str>) -> bool {
        audience.map_or(true, |tag| self.allowed.contains(tag.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_audience_is_universal() {
        let table = ScopeTable::standard();
        for scope in BusinessScope::ALL {
            assert!(table.filter(scope).allows(None));
        }
    }

    #[test]
    fn standard_mapping_separates_staff_and_consumer_tags() {
        let table = ScopeTable::standard();
        let external = table.filter(BusinessScope::External);
        let internal = table.filter(BusinessScope::Internal);

        assert!(external.allows(Some("租客")));
        assert!(!external.allows(Some("管理師")));
        assert!(internal.allows(Some("管理師")));
        assert!(!internal.allows(Some("租客")));
        assert!(external.allows(Some("general")) && internal.allows(Some("general")));
        assert!(internal.allows(Some("房東/管理師")));
        assert!(!external.allows(Some("房東/管理師")));
    }

    #[test]
    fn from_config_rejects_unknown_scope() {
        let mut raw = HashMap::new();
        raw.insert("external".to_string(), vec!["租客".to_string()]);
        raw.insert("internal".to_string(), vec!["管理師".to_string()]);
        raw.insert("partner".to_string(), vec!["x".to_string()]);
        assert!(matches!(
            ScopeTable::from_config(&raw),
            Err(ScopeError::UnknownScope(_))
        ));
    }

    #[test]
    fn from_config_requires_both_scopes() {
        let mut raw = HashMap::new();
        raw.insert("external".to_string(), vec!["租客".to_string()]);
        assert_eq!(
            ScopeTable::from_config(&raw),
            Err(ScopeError::MissingScope(BusinessScope::Internal))
        );
    }

    #[test]
    fn from_config_round_trip() {
        let mut raw = HashMap::new();
        raw.insert("External".to_string(), vec![" vip ".to_string()]);
        raw.insert("internal".to_string(), vec!["staff".to_string()]);
        let table = ScopeTable::from_config(&raw).unwrap();
        assert!(table.filter(BusinessScope::External).allows(Some("vip")));
        assert!(!table.filter(BusinessScope::External).allows(Some("staff")));
    }
}
