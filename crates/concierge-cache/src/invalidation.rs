//! Invalidation events announced by the admin subsystem

use crate::error::{CacheError, InvalidationError};
use concierge_model::{IntentId, KnowledgeId, ProcedureId, SourceId, TenantId};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Typed invalidation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// Knowledge item edited; related intents are invalidated after it
    KnowledgeUpdate {
        knowledge_id: KnowledgeId,
        related_intents: Vec<IntentId>,
    },
    IntentUpdate {
        intent_ids: Vec<IntentId>,
    },
    ProcedureUpdate {
        procedure_id: ProcedureId,
    },
    /// Every entry of the tenant
    VendorUpdate {
        tenant: TenantId,
    },
}

/// One unit of invalidation work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    Source(SourceId),
    Intent(IntentId),
    Tenant(TenantId),
}

impl InvalidationEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KnowledgeUpdate { .. } => "knowledge_update",
            Self::IntentUpdate { .. } => "intent_update",
            Self::ProcedureUpdate { .. } => "procedure_update",
            Self::VendorUpdate { .. } => "vendor_update",
        }
    }

    /// Ordered work list
    #[must_use]
    pub fn targets(&self) -> Vec<InvalidationTarget> {
        match self {
            Self::KnowledgeUpdate {
                knowledge_id,
                related_intents,
            } => std::iter::once(InvalidationTarget::Source((*knowledge_id).into()))
                .chain(related_intents.iter().copied().map(InvalidationTarget::Intent))
                .collect(),
            Self::IntentUpdate { intent_ids } => intent_ids
                .iter()
                .copied()
                .map(InvalidationTarget::Intent)
                .collect(),
            Self::ProcedureUpdate { procedure_id } => {
                vec![InvalidationTarget::Source((*procedure_id).into())]
            }
            Self::VendorUpdate { tenant } => vec![InvalidationTarget::Tenant(*tenant)],
        }
    }
}

/// Wire form of an invalidation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub knowledge_id: Option<u64>,
    #[serde(default)]
    pub procedure_id: Option<u64>,
    #[serde(default)]
    pub intent_ids: Option<Vec<u64>>,
    #[serde(default)]
    pub vendor_id: Option<u64>,
}

impl TryFrom<InvalidationRequest> for InvalidationEvent {
    type Error = InvalidationError;

    fn try_from(req: InvalidationRequest) -> Result<Self, Self::Error> {
        let intents = |ids: Option<Vec<u64>>| -> Vec<IntentId> {
            let mut ids: Vec<IntentId> = ids.unwrap_or_default().into_iter().map(IntentId).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        match req.kind.as_str() {
            "knowledge_update" => {
                let knowledge_id = req
                    .knowledge_id
                    .ok_or_else(|| InvalidationError::missing("knowledge_update", "knowledge_id"))?;
                Ok(Self::KnowledgeUpdate {
                    knowledge_id: KnowledgeId(knowledge_id),
                    related_intents: intents(req.intent_ids),
                })
            }
            "intent_update" => {
                let intent_ids = intents(req.intent_ids);
                if intent_ids.is_empty() {
                    return Err(InvalidationError::missing("intent_update", "intent_ids"));
                }
                Ok(Self::IntentUpdate { intent_ids })
            }
            "procedure_update" => {
                let procedure_id = req
                    .procedure_id
                    .ok_or_else(|| InvalidationError::missing("procedure_update", "procedure_id"))?;
                Ok(Self::ProcedureUpdate {
                    procedure_id: ProcedureId(procedure_id),
                })
            }
            "vendor_update" => {
                let vendor_id = req
                    .vendor_id
                    .ok_or_else(|| InvalidationError::missing("vendor_update", "vendor_id"))?;
                Ok(Self::VendorUpdate {
                    tenant: TenantId(vendor_id),
                })
            }
            other => Err(InvalidationError::UnknownType(other.to_string())),
        }
    }
}

/// Outcome of an invalidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationReport {
    pub success: bool,
    /// Entries actually removed, including those removed before a failure
    pub invalidated_count: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl InvalidationReport {
    /// Rejected request; nothing was touched
    #[must_use]
    pub fn rejected(err: &InvalidationError) -> Self {
        Self {
            success: false,
            invalidated_count: 0,
            message: err.to_string(),
            partial: false,
        }
    }
}

/// Run `step` over `targets` in order, stopping at the first failure
///
/// The report carries the count accumulated before the failure and is marked
/// partial when at least one step had already completed.
pub async fn apply_steps<F, Fut>(
    kind: &str,
    targets: Vec<InvalidationTarget>,
    mut step: F,
) -> InvalidationReport
where
    F: FnMut(InvalidationTarget) -> Fut,
    Fut: Future<Output = Result<u64, CacheError>>,
{
    let total = targets.len();
    let mut count = 0u64;

    for (done, target) in targets.into_iter().enumerate() {
        match step(target).await {
            Ok(removed) => count += removed,
            Err(err) => {
                tracing::warn!(kind, ?target, completed = done, total, %err, "invalidation step failed");
                return InvalidationReport {
                    success: false,
                    invalidated_count: count,
                    message: format!(
                        "{kind} failed after {done}/{total} steps ({count} entries invalidated): {err}"
                    ),
                    partial: done > 0,
                };
            }
        }
    }

    InvalidationReport {
        success: true,
        invalidated_count: count,
        message: format!("{kind}: invalidated {count} entries"),
        partial: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str) -> InvalidationRequest {
        InvalidationRequest {
            kind: kind.to_string(),
            ..InvalidationRequest::default()
        }
    }

    #[test]
    fn missing_ids_are_rejected() {
        for kind in ["knowledge_update", "intent_update", "procedure_update", "vendor_update"] {
            let err = InvalidationEvent::try_from(request(kind)).unwrap_err();
            assert!(matches!(err, InvalidationError::MissingField { .. }), "{kind}");
        }
        let empty_intents = InvalidationRequest {
            intent_ids: Some(vec![]),
            ..request("intent_update")
        };
        assert!(InvalidationEvent::try_from(empty_intents).is_err());
    }

    #[test]
    fn unknown_type_rejected() {
        assert_eq!(
            InvalidationEvent::try_from(request("flush")),
            Err(InvalidationError::UnknownType("flush".to_string()))
        );
    }

    #[test]
    fn knowledge_update_targets_source_then_intents() {
        let event = InvalidationEvent::try_from(InvalidationRequest {
            knowledge_id: Some(7),
            intent_ids: Some(vec![3, 2, 3]),
            ..request("knowledge_update")
        })
        .unwrap();
        assert_eq!(
            event.targets(),
            vec![
                InvalidationTarget::Source(SourceId::Knowledge(KnowledgeId(7))),
                InvalidationTarget::Intent(IntentId(2)),
                InvalidationTarget::Intent(IntentId(3)),
            ]
        );
    }

    #[test]
    fn request_parses_from_wire_json() {
        let req: InvalidationRequest =
            serde_json::from_str(r#"{"type":"vendor_update","vendor_id":4}"#).unwrap();
        assert_eq!(
            InvalidationEvent::try_from(req).unwrap(),
            InvalidationEvent::VendorUpdate { tenant: TenantId(4) }
        );
    }

    #[tokio::test]
    async fn partial_failure_reports_progress() {
        let targets = vec![
            InvalidationTarget::Source(SourceId::Knowledge(KnowledgeId(1))),
            InvalidationTarget::Intent(IntentId(1)),
            InvalidationTarget::Intent(IntentId(2)),
        ];
        let report = apply_steps("knowledge_update", targets, |target| async move {
            match target {
                InvalidationTarget::Intent(IntentId(2)) => {
                    Err(CacheError::Unavailable("connection reset".to_string()))
                }
                _ => Ok(2),
            }
        })
        .await;

        assert!(!report.success);
        assert!(report.partial);
        assert_eq!(report.invalidated_count, 4);
        assert!(report.message.contains("2/3"));
    }

    #[tokio::test]
    async fn all_steps_succeeding_is_success() {
        let report = apply_steps(
            "intent_update",
            vec![InvalidationTarget::Intent(IntentId(1))],
            |_| async { Ok(0) },
        )
        .await;
        assert!(report.success);
        assert!(!report.partial);
        assert_eq!(report.invalidated_count, 0);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("partial").is_none());
    }
}
