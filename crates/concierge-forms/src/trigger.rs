//! Procedure trigger evaluation

use concierge_model::{normalize_question, FormId, IntentId, ProcedureId, ProcedureItem, TriggerMode};
use serde::{Deserialize, Serialize};

/// Which trigger mode fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiredBy {
    Keyword,
    Intent,
    Always,
}

/// A procedure whose trigger condition held
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFire {
    pub procedure: ProcedureId,
    pub fired_by: FiredBy,
    /// Form to start or resume; `None` means the procedure only answers
    pub next_form: Option<FormId>,
}

/// Stateless trigger evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcedureTrigger;

impl ProcedureTrigger {
    /// Evaluate `procedure`'s trigger for one question
    ///
    /// `classified` holds the primary and secondary intent ids of the
    /// question. `is_top_ranked` is whether the procedure is the overall best
    /// retrieval candidate, which `Always` requires.
    #[must_use]
    pub fn evaluate(
        &self,
        procedure: &ProcedureItem,
        question: &str,
        classified: &[IntentId],
        is_top_ranked: bool,
    ) -> Option<TriggerFire> {
        let fired_by = match procedure.trigger.as_ref()? {
            TriggerMode::Keyword { keywords } => {
                let normalized = normalize_question(question);
                keywords
                    .iter()
                    .map(|k| normalize_question(k))
                    .any(|k| !k.is_empty() && normalized.contains(&k))
                    .then_some(FiredBy::Keyword)?
            }
            TriggerMode::Intent { intent_ids } => intent_ids
                .iter()
                .any(|id| classified.contains(id))
                .then_some(FiredBy::Intent)?,
            TriggerMode::Always => is_top_ranked.then_some(FiredBy::Always)?,
        };

        tracing::debug!(
            procedure = %procedure.id,
            ?fired_by,
            next_form = ?procedure.next_form_id,
            "procedure trigger fired"
        );
        Some(TriggerFire {
            procedure: procedure.id,
            fired_by,
            next_form: procedure.next_form_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_model::{Embedding, TenantId};

    fn procedure(trigger: TriggerMode) -> ProcedureItem {
        ProcedureItem::new(
            ProcedureId(7),
            TenantId(1),
            "報修流程",
            "設備故障時請填寫報修單",
            Some(Embedding::new(vec![1.0, 0.0])),
            None,
        )
        .unwrap()
        .with_trigger(trigger, Some(FormId::new("repair_request")))
    }

    #[test]
    fn keyword_mode_matches_normalized_containment() {
        let p = procedure(TriggerMode::Keyword {
            keywords: vec!["報修".into(), "REPAIR".into()],
        });
        let t = ProcedureTrigger;
        assert_eq!(
            t.evaluate(&p, "我要報修冷氣", &[], false).map(|f| f.fired_by),
            Some(FiredBy::Keyword)
        );
        assert!(t.evaluate(&p, "need a Repair please", &[], false).is_some());
        assert!(t.evaluate(&p, "租金多少", &[], true).is_none());
    }

    #[test]
    fn intent_mode_checks_classified_ids() {
        let p = procedure(TriggerMode::Intent {
            intent_ids: vec![IntentId(3)],
        });
        let t = ProcedureTrigger;
        let fire = t.evaluate(&p, "冷氣壞了", &[IntentId(1), IntentId(3)], false).unwrap();
        assert_eq!(fire.next_form, Some(FormId::new("repair_request")));
        assert!(t.evaluate(&p, "冷氣壞了", &[IntentId(1)], true).is_none());
    }

    #[test]
    fn always_mode_requires_top_rank() {
        let p = procedure(TriggerMode::Always);
        let t = ProcedureTrigger;
        assert!(t.evaluate(&p, "x", &[], true).is_some());
        assert!(t.evaluate(&p, "x", &[], false).is_none());
    }

    #[test]
    fn no_trigger_never_fires() {
        let mut p = procedure(TriggerMode::Always);
        p.trigger = None;
        assert!(ProcedureTrigger.evaluate(&p, "x", &[], true).is_none());
    }
}
