//! Strongly-typed identifiers
//!
//! Catalog ids (tenants, knowledge, procedures, intents) are assigned by the
//! admin subsystem and arrive as integers. Ids minted by the serving pipeline
//! itself (form sessions, unclear-question records) are ULIDs.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw catalog id
            #[inline]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw integer value
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

catalog_id!(
    /// Tenant (vendor) identifier
    TenantId,
    "tenant:"
);
catalog_id!(
    /// Knowledge item identifier
    KnowledgeId,
    "knowledge:"
);
catalog_id!(
    /// Procedure (SOP) item identifier
    ProcedureId,
    "procedure:"
);
catalog_id!(
    /// Intent identifier
    IntentId,
    "intent:"
);

/// Identifier of a retrievable answer source
///
/// Ordering is total: knowledge sources sort before procedure sources, then by
/// raw id. Retrieval uses it as the deterministic tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceId {
    Knowledge(KnowledgeId),
    Procedure(ProcedureId),
}

impl SourceId {
    /// Raw integer id regardless of corpus
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        match self {
            Self::Knowledge(id) => id.0,
            Self::Procedure(id) => id.0,
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Knowledge(id) => Display::fmt(id, f),
            Self::Procedure(id) => Display::fmt(id, f),
        }
    }
}

impl From<KnowledgeId> for SourceId {
    fn from(id: KnowledgeId) -> Self {
        Self::Knowledge(id)
    }
}

impl From<ProcedureId> for SourceId {
    fn from(id: ProcedureId) -> Self {
        Self::Procedure(id)
    }
}

/// Form schema identifier (slug such as `repair_request`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(String);

impl FormId {
    #[inline]
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// End-user (or chat session) identifier supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty after trimming
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! minted_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self)
            }
        }
    };
}

minted_id!(
    /// Form session identifier
    SessionId
);
minted_id!(
    /// Unclear-question record identifier
    UnclearId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_orders_knowledge_first_then_raw() {
        let mut ids = vec![
            SourceId::Procedure(ProcedureId(1)),
            SourceId::Knowledge(KnowledgeId(9)),
            SourceId::Knowledge(KnowledgeId(2)),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                SourceId::Knowledge(KnowledgeId(2)),
                SourceId::Knowledge(KnowledgeId(9)),
                SourceId::Procedure(ProcedureId(1)),
            ]
        );
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(TenantId(3).to_string(), "tenant:3");
        assert_eq!(SourceId::from(ProcedureId(7)).to_string(), "procedure:7");
    }

    #[test]
    fn source_id_serde_shape() {
        let json = serde_json::to_string(&SourceId::Knowledge(KnowledgeId(4))).unwrap();
        assert_eq!(json, r#"{"kind":"knowledge","id":4}"#);
    }

    #[test]
    fn minted_ids_round_trip_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
