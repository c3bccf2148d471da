//! Invalidation visibility under concurrent writers

use concierge_cache::{
    AnswerKind, CacheConfig, CachedAnswer, InvalidationEvent, ResponseCache, SourceRef,
};
use concierge_model::{KnowledgeId, SourceId, TenantId};
use std::sync::Arc;

fn answer_for(knowledge: u64) -> CachedAnswer {
    CachedAnswer {
        answer: format!("answer {knowledge}"),
        kind: AnswerKind::Direct,
        sources: vec![SourceRef {
            id: SourceId::Knowledge(KnowledgeId::new(knowledge)),
            label: "label".to_string(),
        }],
        intents: vec![],
        intent_name: None,
        confidence: 0.8,
    }
}

/// Tenet: after an invalidation is acknowledged, no lookup returns an entry
/// computed before it, even with writers racing the invalidation.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_stale_entry_survives_racing_writers() {
    let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
    let tenant = TenantId::new(1);
    let before = cache.epoch();

    let mut writers = Vec::new();
    for i in 0..32u32 {
        let cache = Arc::clone(&cache);
        writers.push(tokio::spawn(async move {
            let observed = cache.epoch();
            tokio::task::yield_now().await;
            let fp = cache.fingerprint(tenant, &format!("question {i}"));
            cache
                .insert_if_fresh(fp, tenant, answer_for(1), observed)
                .await
                .unwrap();
            (fp, observed)
        }));
    }

    let report = cache
        .invalidate(&InvalidationEvent::KnowledgeUpdate {
            knowledge_id: KnowledgeId::new(1),
            related_intents: vec![],
        })
        .await;
    assert!(report.success);

    for writer in writers {
        let (fp, observed) = writer.await.unwrap();
        if observed == before {
            assert!(
                cache.lookup(&fp).await.unwrap().is_none(),
                "entry computed before invalidation is visible"
            );
        }
    }
}

#[tokio::test]
async fn sequential_invalidate_then_lookup_never_sees_entry() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let tenant = TenantId::new(3);
    let fp = cache.fingerprint(tenant, "押金何時退還");
    let epoch = cache.epoch();
    assert!(cache
        .insert_if_fresh(fp, tenant, answer_for(8), epoch)
        .await
        .unwrap());

    let report = cache
        .invalidate(&InvalidationEvent::VendorUpdate { tenant })
        .await;
    assert_eq!(report.invalidated_count, 1);
    assert!(cache.lookup(&fp).await.unwrap().is_none());
}
