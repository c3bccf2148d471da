//! Dedup scenario: four spellings of one rent question, one unrelated question

use concierge_dedup::{DedupConfig, Deduplicator, InMemoryUnclearStore, MatchLayer, UnclearQuestionStore};
use concierge_model::TenantId;
use concierge_test_utils::FakeEmbedder;
use std::sync::Arc;

const ORIGINAL: &str = "每月租金幾號要繳";
const ONE_CHAR_TYPO: &str = "每月住金幾號要繳";
const HOMOPHONE_PAIR: &str = "每月租金幾號較腳";
const MANGLED: &str = "美月組金幾號藥角";
const WEATHER: &str = "今天天氣如何？";

fn embedder() -> Arc<FakeEmbedder> {
    Arc::new(
        FakeEmbedder::new()
            .with(ORIGINAL, vec![1.0, 0.0, 0.0])
            .with(ONE_CHAR_TYPO, vec![0.95, 0.31, 0.0])
            .with(HOMOPHONE_PAIR, vec![0.9, 0.43, 0.0])
            // Semantic similarity ~0.70: only the phonetic layer can catch it
            .with(MANGLED, vec![0.7, 0.714, 0.0])
            .with(WEATHER, vec![0.0, 0.0, 1.0]),
    )
}

/// Tenet: lexical, combined and phonetic variants fold into the first-seen
/// record; an unrelated question never does.
#[tokio::test]
async fn variants_fold_into_one_record_with_frequency_four() {
    let store = Arc::new(InMemoryUnclearStore::new());
    let dedup = Deduplicator::new(store.clone(), embedder(), DedupConfig::default());
    let tenant = TenantId::new(1);

    let first = dedup.record(tenant, ORIGINAL, None).await.unwrap();
    assert!(first.evidence.is_none());

    let typo = dedup.record(tenant, ONE_CHAR_TYPO, None).await.unwrap();
    assert_eq!(typo.merged_by(), Some(MatchLayer::EditDistance));

    let pair = dedup.record(tenant, HOMOPHONE_PAIR, None).await.unwrap();
    assert!(pair.merged_by().is_some());

    let weather = dedup.record(tenant, WEATHER, None).await.unwrap();
    assert!(weather.evidence.is_none());

    let mangled = dedup.record(tenant, MANGLED, None).await.unwrap();
    assert_eq!(mangled.merged_by(), Some(MatchLayer::Phonetic));
    assert_eq!(mangled.record.id, first.record.id);

    let rows = store.list(tenant, None).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].question, ORIGINAL);
    assert_eq!(rows[0].frequency, 4);
    assert_eq!(rows[1].question, WEATHER);
    assert_eq!(rows[1].frequency, 1);
}

#[tokio::test]
async fn concurrent_duplicates_create_a_single_record() {
    let store = Arc::new(InMemoryUnclearStore::new());
    let dedup = Arc::new(Deduplicator::new(store.clone(), embedder(), DedupConfig::default()));
    let tenant = TenantId::new(7);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let dedup = Arc::clone(&dedup);
            tokio::spawn(async move { dedup.record(tenant, ORIGINAL, None).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let rows = store.list(tenant, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].frequency, 8);
}

#[tokio::test]
async fn resolved_records_are_not_merge_targets() {
    let store = Arc::new(InMemoryUnclearStore::new());
    let dedup = Deduplicator::new(store.clone(), embedder(), DedupConfig::default());
    let tenant = TenantId::new(2);

    let first = dedup.record(tenant, ORIGINAL, None).await.unwrap();
    store
        .set_status(first.record.id, concierge_dedup::UnclearStatus::Resolved)
        .await
        .unwrap();

    let again = dedup.record(tenant, ORIGINAL, None).await.unwrap();
    assert!(again.evidence.is_none());
    assert_ne!(again.record.id, first.record.id);
}
