use chrono::{TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use service_marketplace::domain::{
    CustomerId, LedgerAdjustment, Money, OrderStatus, SubService, SubServiceId, SuggestionRequest,
    Technician, TechnicianId,
};
use service_marketplace::{
    BiddingWorkflow, Clock, ErrorKind, FixedClock, InMemoryStore, JournalSources, SequentialIds,
};

// ============================================================================
// End-to-end order lifecycle against the in-memory store
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_with_late_finish() {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 7, 0, 0).unwrap()));
    let ids = Arc::new(SequentialIds::new());
    let store = InMemoryStore::new().with_sources(JournalSources::new(clock.clone(), ids.clone()));

    let technician = TechnicianId(Uuid::from_u128(7));
    let rival = TechnicianId(Uuid::from_u128(8));
    let sub_service = SubServiceId(Uuid::from_u128(3));
    store.insert_technician(Technician::new(technician, "Dana")).await;
    store.insert_technician(Technician::new(rival, "Eli")).await;
    store
        .insert_sub_service(
            SubService::new(sub_service, "Boiler service", Money(500))
                .with_technician(technician)
                .with_technician(rival),
        )
        .await;

    let workflow = BiddingWorkflow::new(Arc::new(store.clone()), clock.clone(), ids);

    let order = workflow
        .place_order(
            CustomerId(Uuid::from_u128(1)),
            sub_service,
            "Annual boiler check",
            "Flat 3, 9 Mill Lane",
            clock.now() + TimeDelta::days(2),
        )
        .await
        .unwrap();

    // bids from text, as a technician form would send them
    let winning = workflow
        .submit_suggestion(
            SuggestionRequest::parse(technician, order.id, Money(650), "2026-05-05", "08:00", "02:00").unwrap(),
        )
        .await
        .unwrap();
    workflow
        .submit_suggestion(SuggestionRequest::parse(rival, order.id, Money(600), "2026-05-05", "09:00", "01:30").unwrap())
        .await
        .unwrap();

    let malformed = SuggestionRequest::parse(rival, order.id, Money(600), "05/05/2026", "09:00", "01:30");
    assert!(malformed.is_err());

    let cheapest = workflow.rank_suggestions_by_price(order.id, true).await.unwrap();
    assert_eq!(cheapest[0].technician_id, rival);

    let selected = workflow.select_suggestion(order.id, winning.id).await.unwrap();
    assert_eq!(selected.price, Some(Money(650)));
    assert_eq!(selected.status, OrderStatus::AwaitingTechnicianArrival);

    let err = workflow
        .submit_suggestion(SuggestionRequest::parse(rival, order.id, Money(550), "2026-05-05", "11:00", "01:00").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    clock.set(Utc.with_ymd_and_hms(2026, 5, 5, 8, 5, 0).unwrap());
    workflow.start_order(order.id).await.unwrap();

    // promised 10:00, finished 13:30
    clock.set(Utc.with_ymd_and_hms(2026, 5, 5, 13, 30, 0).unwrap());
    assert_eq!(workflow.compute_lateness_hours(order.id).await.unwrap(), 3);

    let finished = workflow
        .handle_finish_order(order.id, 8.0, Some("Good, but late".to_string()))
        .await
        .unwrap();
    assert_eq!(finished.status, OrderStatus::Finished);

    let err = workflow.pay_online(order.id, Money(650), "1234", "4321").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let paid = workflow.pay_online(order.id, Money(650), "1234", "1234").await.unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    let err = workflow.pay_online(order.id, Money(650), "1234", "1234").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let ledger: Vec<_> = workflow
        .technician_ledger(technician)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.adjustment)
        .collect();
    assert_eq!(
        ledger,
        vec![
            LedgerAdjustment::ScoreAdded(8.0),
            LedgerAdjustment::ScoreReduced(3.0),
            LedgerAdjustment::CreditAdded(Money(650)),
        ]
    );

    let dana = store.technician(technician).await.unwrap();
    assert_eq!(dana.score, 5.0);
    assert_eq!(dana.credit, Money(650));
    assert_eq!(store.technician(rival).await.unwrap().score, 0.0);

    let history = workflow.order_history(order.id).await.unwrap();
    assert_eq!(history.len(), 8);
    assert_eq!(history.last().unwrap().event_type, "OrderPaid");
    assert_eq!(history.last().unwrap().timestamp, clock.now());
}
