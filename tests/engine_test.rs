use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use workspace_gate::application::engine::{EngineStores, FEATURE_PAYMENTS, WorkspaceEngine};
use workspace_gate::application::subscription_store::SubscriptionPhase;
use workspace_gate::config::EngineConfig;
use workspace_gate::domain::access::{DenialNotice, DenialReason};
use workspace_gate::domain::ids::{PrincipalId, TenantId};
use workspace_gate::domain::payment::{NewPayment, PaymentStatus, PaymentUpdate};
use workspace_gate::domain::ports::{PaymentStore, PaymentStoreRef, ProjectStore, ProjectStoreRef};
use workspace_gate::domain::subscription::RawBillingRecord;
use workspace_gate::error::EngineError;
use workspace_gate::infrastructure::in_memory::InMemoryStore;

const TENANT: TenantId = TenantId(3);

fn installment(month: u32, status: PaymentStatus) -> NewPayment {
    NewPayment {
        amount: dec!(1500).try_into().unwrap(),
        due_date: NaiveDate::from_ymd_opt(2026, month, 10).unwrap(),
        status,
        paid_at: None,
    }
}

fn start(store: &InMemoryStore, principal: &str) -> WorkspaceEngine {
    WorkspaceEngine::start(
        PrincipalId::new(principal),
        EngineStores::shared(store.clone()),
        &EngineConfig::default(),
    )
}

#[tokio::test]
async fn test_project_lifecycle_follows_subscription() {
    let store = InMemoryStore::new();
    store.link_principal(PrincipalId::new("studio"), TENANT).await;
    store
        .set_billing_record(TENANT, RawBillingRecord::new("paid", Some("annual"), "active"))
        .await;
    let engine = start(&store, "studio");

    let (project, report) = engine.create_project("Bakery site").await.unwrap();
    assert!(report.used_default);

    engine
        .add_payment(project, installment(3, PaymentStatus::Pendente))
        .await
        .unwrap();
    engine
        .add_payment(project, installment(5, PaymentStatus::Pendente))
        .await
        .unwrap();
    let status = engine
        .sweep_overdue(project, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(status, PaymentStatus::Atrasado);

    let mut phase = engine.subscriptions().watch();
    phase.borrow_and_update();
    store
        .set_billing_record(TENANT, RawBillingRecord::new("paid", Some("annual"), "canceled"))
        .await;
    phase.changed().await.unwrap();

    let payments = store.fetch_payments(project).await.unwrap();
    let result = engine
        .update_payment(project, payments[0].id, PaymentUpdate::status(PaymentStatus::Pago))
        .await;
    match result {
        Err(EngineError::AccessDenied(denial)) => {
            assert_eq!(denial.reason, DenialReason::Policy);
            assert_eq!(denial.feature.as_deref(), Some(FEATURE_PAYMENTS));
            assert_eq!(denial.notice, Some(DenialNotice::SubscriptionEnded));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        store.fetch_payment(payments[0].id).await.unwrap().unwrap().status,
        PaymentStatus::Atrasado
    );
}

#[tokio::test]
async fn test_unlinked_principal_is_a_system_denial() {
    let store = InMemoryStore::new();
    let engine = start(&store, "stranger");

    assert!(matches!(
        engine.subscriptions().initialized().await,
        Err(EngineError::TenantNotAssociated { .. })
    ));
    assert_eq!(engine.subscriptions().phase(), SubscriptionPhase::NoTenant);

    match engine.create_project("Anything").await {
        Err(EngineError::AccessDenied(denial)) => {
            assert_eq!(denial.reason, DenialReason::NoTenant);
            assert!(denial.reason.is_system_error());
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_upgrade_unlocks_mutations() {
    let store = InMemoryStore::new();
    store.link_principal(PrincipalId::new("studio"), TENANT).await;
    let engine = start(&store, "studio");
    engine.subscriptions().initialized().await.unwrap();
    assert!(!engine.guard().allows_now());

    let mut phase = engine.subscriptions().watch();
    phase.borrow_and_update();
    store
        .set_billing_record(TENANT, RawBillingRecord::new("paid", Some("monthly"), "active"))
        .await;
    phase.changed().await.unwrap();

    assert!(engine.guard().allows_now());
    assert!(engine.create_project("Bakery site").await.is_ok());
}

#[tokio::test]
async fn test_store_ports_as_trait_objects() {
    let store = InMemoryStore::new();
    let projects: ProjectStoreRef = Arc::new(store.clone());
    let payments: PaymentStoreRef = Arc::new(store);

    // Send + Sync across spawned tasks.
    let project = tokio::spawn({
        let projects = projects.clone();
        async move { projects.create_project(TENANT, "Bakery site").await.unwrap() }
    })
    .await
    .unwrap();

    let created = tokio::spawn(async move {
        payments
            .create_payment(project, installment(1, PaymentStatus::Pago))
            .await
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(created.project, project);
    let stored = projects.fetch_project(project).await.unwrap().unwrap();
    assert_eq!(stored.name, "Bakery site");
    assert!(!stored.ready);
}
