//! Rent-management catalog fixture
//!
//! Vectors are four-dimensional and chosen so that each named question has a
//! known score against every item.

use crate::FakeEmbedder;
use concierge_model::{
    BusinessScope, Embedding, FieldKind, FormField, FormId, FormSchema, InMemoryCatalog, Intent,
    IntentId, KnowledgeId, KnowledgeItem, ProcedureId, ProcedureItem, TenantId, TenantProfile,
    TriggerMode,
};
use std::sync::Arc;

pub const EXTERNAL_TENANT: TenantId = TenantId(1);
pub const INTERNAL_TENANT: TenantId = TenantId(2);

pub const RENT_DUE_ID: KnowledgeId = KnowledgeId(101);
pub const RENT_METHOD_ID: KnowledgeId = KnowledgeId(102);
pub const STAFF_ONLY_ID: KnowledgeId = KnowledgeId(103);
pub const REPAIR_ID: ProcedureId = ProcedureId(201);

pub const RENT_INTENT: IntentId = IntentId(1);
pub const REPAIR_INTENT: IntentId = IntentId(2);

pub const REPAIR_FORM: &str = "repair_request";

/// Scores 1.0 against the rent-due item and 0.9 against the payment-method item
pub const RENT_DUE_QUESTION: &str = "每月租金幾號要繳";
/// Scores 1.0 against the repair procedure's primary embedding
pub const REPAIR_QUESTION: &str = "我家冷氣壞了要報修";
/// Scores 0.0 against everything
pub const WEATHER_QUESTION: &str = "今天天氣如何？";

pub const RENT_DUE_ANSWER: &str = "租金請於每月 5 號前繳納。";
pub const RENT_METHOD_ANSWER: &str = "可使用銀行轉帳或超商代收繳納租金。";

/// Catalog plus an embedder that knows the fixture questions
#[derive(Debug, Clone)]
pub struct RentFixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub embedder: Arc<FakeEmbedder>,
}

fn embedding(values: [f32; 4]) -> Embedding {
    Embedding::new(values.to_vec())
}

fn knowledge(
    id: KnowledgeId,
    tenant: TenantId,
    summary: &str,
    answer: &str,
    audience: Option<&str>,
    values: [f32; 4],
) -> KnowledgeItem {
    KnowledgeItem {
        id,
        tenant,
        question_summary: summary.to_string(),
        answer: answer.to_string(),
        keywords: Vec::new(),
        audience: audience.map(str::to_string),
        embedding: embedding(values),
        active: true,
    }
}

/// Build the fixture
///
/// - tenant 1: external scope, no synthesis preference
/// - tenant 2: internal scope, synthesis enabled
/// - knowledge 101 (租客) and 102 (universal) about rent, 103 staff only
/// - procedure 201 repair, keyword trigger, starts `repair_request`
/// - intents 1 繳租 and 2 報修, plus a disabled intent 3
#[must_use]
pub fn rent_fixture() -> RentFixture {
    let catalog = InMemoryCatalog::new();

    catalog.upsert_tenant(TenantProfile::new(EXTERNAL_TENANT, "幸福物業", BusinessScope::External));
    catalog.upsert_tenant(
        TenantProfile::new(INTERNAL_TENANT, "企業管家", BusinessScope::Internal).with_synthesis(true),
    );

    for tenant in [EXTERNAL_TENANT, INTERNAL_TENANT] {
        catalog.upsert_knowledge(knowledge(
            KnowledgeId(RENT_DUE_ID.get() + (tenant.get() - 1) * 1000),
            tenant,
            "每月租金繳納日",
            RENT_DUE_ANSWER,
            Some("租客|管理師"),
            [1.0, 0.0, 0.0, 0.0],
        ));
        catalog.upsert_knowledge(knowledge(
            KnowledgeId(RENT_METHOD_ID.get() + (tenant.get() - 1) * 1000),
            tenant,
            "租金繳納方式",
            RENT_METHOD_ANSWER,
            None,
            [0.9, 0.435_89, 0.0, 0.0],
        ));
    }
    catalog.upsert_knowledge(knowledge(
        STAFF_ONLY_ID,
        EXTERNAL_TENANT,
        "管理師催繳作業",
        "催繳請使用後台報表。",
        Some("管理師"),
        [1.0, 0.0, 0.0, 0.0],
    ));

    let repair = ProcedureItem::new(
        REPAIR_ID,
        EXTERNAL_TENANT,
        "報修流程",
        "設備故障請提供位置與聯絡電話，我們會安排師傅到府。",
        Some(embedding([0.0, 1.0, 0.0, 0.0])),
        Some(embedding([0.0, 0.8, 0.6, 0.0])),
    )
    .expect("fixture procedure has embeddings")
    .with_trigger(
        TriggerMode::Keyword {
            keywords: vec!["報修".to_string(), "壞了".to_string()],
        },
        Some(FormId::new(REPAIR_FORM)),
    );
    catalog.upsert_procedure(repair);

    catalog
        .upsert_intent(Intent::new(RENT_INTENT, "繳租", &["租金", "繳"]))
        .expect("valid intent");
    catalog
        .upsert_intent(Intent::new(REPAIR_INTENT, "報修", &["報修", "壞了", "維修"]).with_priority(1))
        .expect("valid intent");
    catalog
        .upsert_intent(Intent::new(IntentId(3), "停用", &["天氣"]).disabled())
        .expect("valid intent");

    let mut form = FormSchema::new(
        FormId::new(REPAIR_FORM),
        EXTERNAL_TENANT,
        "報修單",
        vec![
            FormField::new("location", "請問是哪個位置需要維修?", FieldKind::Text),
            FormField::new("phone", "請留下聯絡電話", FieldKind::Phone),
        ],
    )
    .expect("fixture form has fields");
    form.completion_message = Some("已收到您的報修，將儘快安排。".to_string());
    catalog.upsert_form(form);

    let embedder = FakeEmbedder::new()
        .with(RENT_DUE_QUESTION, vec![1.0, 0.0, 0.0, 0.0])
        .with(REPAIR_QUESTION, vec![0.0, 1.0, 0.0, 0.0])
        .with(WEATHER_QUESTION, vec![0.0, 0.0, 0.0, 1.0]);

    RentFixture {
        catalog: Arc::new(catalog),
        embedder: Arc::new(embedder),
    }
}
