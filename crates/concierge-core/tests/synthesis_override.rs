//! Synthesis enablement: request override, tenant default, global flag

use concierge_core::{AnswerOutcome, ChatRequest, ConciergeConfig, GateConfig, ProviderConfig, QueryPipeline};
use concierge_model::SourceId;
use concierge_test_utils::fixtures::{
    rent_fixture, EXTERNAL_TENANT, INTERNAL_TENANT, RENT_DUE_ANSWER, RENT_DUE_ID, RENT_DUE_QUESTION,
    RENT_METHOD_ID,
};
use concierge_test_utils::ScriptedCompletion;
use std::sync::Arc;

const COMBINED: &str = "租金請於每月 5 號前繳納，可使用銀行轉帳或超商代收。";

fn pipeline(global: bool) -> (QueryPipeline, Arc<ScriptedCompletion>) {
    let fixture = rent_fixture();
    let completion = Arc::new(ScriptedCompletion::new().with_default(COMBINED));
    let config = ConciergeConfig::default()
        .with_gate(GateConfig::default().with_synthesis(global))
        .with_provider(ProviderConfig {
            max_retries: 0,
            ..ProviderConfig::default()
        });
    let pipeline = QueryPipeline::builder(config)
        .catalog(fixture.catalog)
        .embedder(fixture.embedder)
        .completion(completion.clone())
        .build()
        .unwrap();
    (pipeline, completion)
}

#[tokio::test]
async fn explicit_override_beats_global_flag() {
    let cases = [
        (true, true, AnswerOutcome::Synthesized),
        (true, false, AnswerOutcome::Direct),
        (false, true, AnswerOutcome::Synthesized),
        (false, false, AnswerOutcome::Direct),
    ];

    for (global, override_to, expected) in cases {
        let (pipeline, completion) = pipeline(global);
        let request = ChatRequest::new(EXTERNAL_TENANT, RENT_DUE_QUESTION).with_synthesis_override(override_to);
        let response = pipeline.answer(&request).await.unwrap();

        assert_eq!(
            response.meta.outcome, expected,
            "global={global} override={override_to}"
        );
        match expected {
            AnswerOutcome::Synthesized => {
                assert_eq!(response.answer, COMBINED);
                let ids: Vec<SourceId> = response.meta.sources.iter().map(|s| s.id).collect();
                assert_eq!(ids, vec![SourceId::from(RENT_DUE_ID), SourceId::from(RENT_METHOD_ID)]);
                assert_eq!(completion.calls(), 1);
            }
            _ => {
                assert_eq!(response.answer, RENT_DUE_ANSWER);
                assert_eq!(response.meta.source_count, 1);
                assert_eq!(completion.calls(), 0);
            }
        }
    }
}

#[tokio::test]
async fn global_flag_applies_without_override() {
    let (on, _) = pipeline(true);
    let response = on.answer(&ChatRequest::new(EXTERNAL_TENANT, RENT_DUE_QUESTION)).await.unwrap();
    assert_eq!(response.meta.outcome, AnswerOutcome::Synthesized);

    let (off, completion) = pipeline(false);
    let response = off.answer(&ChatRequest::new(EXTERNAL_TENANT, RENT_DUE_QUESTION)).await.unwrap();
    assert_eq!(response.meta.outcome, AnswerOutcome::Direct);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn tenant_default_beats_global_flag() {
    let (pipeline, completion) = pipeline(false);
    let response = pipeline
        .answer(&ChatRequest::new(INTERNAL_TENANT, RENT_DUE_QUESTION))
        .await
        .unwrap();
    assert_eq!(response.meta.outcome, AnswerOutcome::Synthesized);
    assert_eq!(completion.calls(), 1);

    let prompt = &completion.requests()[0].messages[1].content;
    assert!(prompt.contains("[資料 1]"));
    assert!(prompt.contains("[資料 2]"));
    assert!(prompt.contains(RENT_DUE_QUESTION));
}
