//! PostgreSQL backend tests.
//!
//! They need a reachable database and are ignored by default:
//! MARKETPLACE_DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored
//!
//! Every test works on freshly generated ids, so a shared database is fine.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use service_marketplace::domain::{
    CustomerId, LedgerAdjustment, Money, Order, OrderStatus, SubService, SubServiceId,
    SuggestionRequest, Technician, TechnicianId, WorkDuration,
};
use service_marketplace::error::MarketplaceError;
use service_marketplace::store::{
    OrderStore, StoreError, StoreTransaction, SuggestionStore, TechnicianLedger,
};
use service_marketplace::{
    BiddingWorkflow, ErrorKind, FixedClock, JournalSources, PostgresStore, Store, UuidV7Generator,
};

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    store: PostgresStore,
    clock: Arc<FixedClock>,
    workflow: Arc<BiddingWorkflow>,
    sub_service: SubServiceId,
    alice: TechnicianId,
    bob: TechnicianId,
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

async fn harness() -> Option<Harness> {
    let Ok(url) = std::env::var("MARKETPLACE_DATABASE_URL") else {
        eprintln!("MARKETPLACE_DATABASE_URL is not set, skipping");
        return None;
    };

    let clock = Arc::new(FixedClock::new(start_time()));
    let ids = Arc::new(UuidV7Generator);
    let store = PostgresStore::connect(&url, 16)
        .await
        .unwrap()
        .with_sources(JournalSources::new(clock.clone(), ids.clone()));
    store.migrate().await.unwrap();

    let alice = TechnicianId(Uuid::now_v7());
    let bob = TechnicianId(Uuid::now_v7());
    let mut alice_record = Technician::new(alice, "Alice");
    alice_record.score = 12.0;
    let mut bob_record = Technician::new(bob, "Bob");
    bob_record.score = 30.0;

    let mut tx = store.begin().await.unwrap();
    tx.ledger().save(alice_record).await.unwrap();
    tx.ledger().save(bob_record).await.unwrap();
    tx.commit().await.unwrap();

    let sub_service = SubServiceId(Uuid::now_v7());
    store
        .upsert_sub_service(
            &SubService::new(sub_service, "Pipe repair", Money(100))
                .with_technician(alice)
                .with_technician(bob),
        )
        .await
        .unwrap();

    let workflow = BiddingWorkflow::new(Arc::new(store.clone()), clock.clone(), ids);
    Some(Harness {
        store,
        clock,
        workflow: Arc::new(workflow),
        sub_service,
        alice,
        bob,
    })
}

impl Harness {
    async fn place(&self) -> Order {
        self.workflow
            .place_order(
                CustomerId(Uuid::now_v7()),
                self.sub_service,
                "Leaking kitchen pipe",
                "12 Elm Street",
                start_time() + TimeDelta::days(1),
            )
            .await
            .unwrap()
    }

    fn request(&self, order: &Order, technician: TechnicianId, price: i64, hour: u32) -> SuggestionRequest {
        SuggestionRequest {
            technician_id: technician,
            order_id: order.id,
            suggested_price: Money(price),
            suggested_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            suggested_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            duration: WorkDuration::new(1, 0).unwrap(),
        }
    }

    async fn score(&self, id: TechnicianId) -> f64 {
        let mut tx = self.store.begin().await.unwrap();
        tx.ledger().find_by_id(id).await.unwrap().score
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_concurrent_selections_only_one_wins() {
    let Some(h) = harness().await else { return };
    let order = h.place().await;
    let a = h.workflow.submit_suggestion(h.request(&order, h.alice, 150, 9)).await.unwrap();
    let b = h.workflow.submit_suggestion(h.request(&order, h.bob, 120, 11)).await.unwrap();

    let (order_id, a_id, b_id) = (order.id, a.id, b.id);
    let first = tokio::spawn({
        let workflow = h.workflow.clone();
        async move { workflow.select_suggestion(order_id, a_id).await }
    });
    let second = tokio::spawn({
        let workflow = h.workflow.clone();
        async move { workflow.select_suggestion(order_id, b_id).await }
    });
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::InvalidState);

    let stored = h.workflow.order_history(order_id).await.unwrap();
    let selections = stored.iter().filter(|e| e.event_type == "OrderSuggestionSelected").count();
    assert_eq!(selections, 1);
}

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_stale_order_save_is_a_version_conflict() {
    let Some(h) = harness().await else { return };
    let order = h.place().await;

    let mut reader = h.store.begin().await.unwrap();
    let stale = reader.orders().read_by_id(order.id).await.unwrap();
    reader.commit().await.unwrap();

    h.workflow.submit_suggestion(h.request(&order, h.alice, 150, 9)).await.unwrap();

    let mut writer = h.store.begin().await.unwrap();
    let err = writer.orders().save(stale).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { expected: 1, actual: 2, .. }), "{err}");
    assert_eq!(MarketplaceError::from(err).kind(), ErrorKind::PersistenceFailure);
}

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_concurrent_point_increments_all_land() {
    let Some(h) = harness().await else { return };
    const WRITERS: usize = 8;

    let mut handles = Vec::with_capacity(WRITERS);
    for _ in 0..WRITERS {
        let store = h.store.clone();
        let alice = h.alice;
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await?;
            tx.ledger().add_points(alice, 1.0).await?;
            tx.commit().await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.score(h.alice).await, 12.0 + WRITERS as f64);
    let mut tx = h.store.begin().await.unwrap();
    assert_eq!(tx.ledger().entries(h.alice).await.unwrap().len(), WRITERS);
}

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_ranking_does_not_wait_for_order_lock() {
    let Some(h) = harness().await else { return };
    let order = h.place().await;
    h.workflow.submit_suggestion(h.request(&order, h.alice, 150, 9)).await.unwrap();
    h.workflow.submit_suggestion(h.request(&order, h.bob, 120, 11)).await.unwrap();

    let mut writer = h.store.begin().await.unwrap();
    writer.orders().find_by_id(order.id).await.unwrap();

    let ranked = tokio::time::timeout(
        Duration::from_secs(5),
        h.workflow.rank_suggestions_by_price(order.id, true),
    )
    .await
    .expect("ranking blocked on the order row lock")
    .unwrap();
    assert_eq!(ranked[0].technician_id, h.bob);

    let late = tokio::time::timeout(Duration::from_secs(5), h.workflow.compute_lateness_hours(order.id))
        .await
        .expect("lateness blocked on the order row lock")
        .unwrap_err();
    assert_eq!(late.kind(), ErrorKind::NotFound);
    drop(writer);
}

// ============================================================================
// Transactions and journals
// ============================================================================

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_dropped_transaction_rolls_back() {
    let Some(h) = harness().await else { return };

    let mut tx = h.store.begin().await.unwrap();
    tx.ledger().add_points(h.alice, 5.0).await.unwrap();
    tx.ledger().add_credit(h.alice, Money(300)).await.unwrap();
    drop(tx);

    let mut tx = h.store.begin().await.unwrap();
    let alice = tx.ledger().find_by_id(h.alice).await.unwrap();
    assert_eq!((alice.score, alice.credit), (12.0, Money(0)));
    assert!(tx.ledger().entries(h.alice).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_ledger_entries_keep_adjustment_order() {
    let Some(h) = harness().await else { return };

    let mut tx = h.store.begin().await.unwrap();
    tx.ledger().add_points(h.bob, 4.0).await.unwrap();
    tx.ledger().reduce_points(h.bob, 2.0).await.unwrap();
    tx.ledger().add_credit(h.bob, Money(120)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = h.store.begin().await.unwrap();
    let adjustments: Vec<_> = tx
        .ledger()
        .entries(h.bob)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.adjustment)
        .collect();
    assert_eq!(
        adjustments,
        vec![
            LedgerAdjustment::ScoreAdded(4.0),
            LedgerAdjustment::ScoreReduced(2.0),
            LedgerAdjustment::CreditAdded(Money(120)),
        ]
    );
    assert_eq!(h.score(h.bob).await, 32.0);
}

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_duplicate_suggestion_insert_fails() {
    let Some(h) = harness().await else { return };
    let order = h.place().await;
    let suggestion = h.workflow.submit_suggestion(h.request(&order, h.alice, 150, 9)).await.unwrap();

    let mut rewrite = suggestion.clone();
    rewrite.suggested_price = Money(1);
    let mut tx = h.store.begin().await.unwrap();
    let err = tx.suggestions().save(rewrite).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }), "{err}");
    drop(tx);

    let mut tx = h.store.begin().await.unwrap();
    assert_eq!(tx.suggestions().find_by_id(suggestion.id).await.unwrap().suggested_price, Money(150));
}

#[tokio::test]
#[ignore = "needs PostgreSQL: set MARKETPLACE_DATABASE_URL and run with --ignored"]
async fn test_full_lifecycle_journals_with_workflow_clock() {
    let Some(h) = harness().await else { return };
    let order = h.place().await;
    let bid = h.workflow.submit_suggestion(h.request(&order, h.alice, 150, 9)).await.unwrap();
    h.workflow.select_suggestion(order.id, bid.id).await.unwrap();
    h.workflow.start_order(order.id).await.unwrap();

    // promised 10:00
    let finished_at = Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap();
    h.clock.set(finished_at);
    h.workflow.handle_finish_order(order.id, 6.0, Some("Fixed".to_string())).await.unwrap();
    let paid = h.workflow.pay_online(order.id, Money(150), "7391", "7391").await.unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    let history = h.workflow.order_history(order.id).await.unwrap();
    let sequence: Vec<_> = history.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequence, (1..=history.len() as i64).collect::<Vec<_>>());
    assert_eq!(history[0].timestamp, start_time());
    assert_eq!(history.last().unwrap().timestamp, finished_at);

    let ledger = h.workflow.technician_ledger(h.alice).await.unwrap();
    assert_eq!(ledger.len(), 3);
    assert!(ledger.iter().all(|entry| entry.recorded_at == finished_at));

    let mut tx = h.store.begin().await.unwrap();
    let alice = tx.ledger().find_by_id(h.alice).await.unwrap();
    assert_eq!((alice.score, alice.credit), (12.0 + 6.0 - 2.0, Money(150)));
}
