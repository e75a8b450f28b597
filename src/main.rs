use anyhow::Context;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use service_marketplace::domain::{
    CustomerId, Money, SubService, SubServiceId, SuggestionRequest, Technician, TechnicianId,
};
use service_marketplace::metrics::{self, Metrics};
use service_marketplace::{
    BiddingWorkflow, Clock, IdGenerator, InMemoryStore, JournalSources, MarketplaceConfig,
    PostgresStore, Store, SystemClock, UuidV7Generator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,service_marketplace=debug"))
        )
        .init();

    tracing::info!("🚀 Starting service marketplace bidding core");

    let config = MarketplaceConfig::from_env().context("Failed to load configuration")?;

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    if config.metrics_enabled() {
        let server_metrics = metrics.clone();
        let port = config.metrics_port;
        std::thread::spawn(move || {
            let result = actix_web::rt::System::new()
                .block_on(metrics::start_metrics_server(server_metrics, port));
            if let Err(e) = result {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    } else {
        tracing::info!("Metrics server disabled");
    }

    // === 2. Open the store and mirror the demo catalog into it ===
    let (technicians, sub_service) = demo_catalog();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGenerator> = Arc::new(UuidV7Generator);
    let sources = JournalSources::new(clock.clone(), ids.clone());
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PostgresStore::connect(url, config.db_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?
                .with_sources(sources);
            store.migrate().await?;

            let mut tx = store.begin().await?;
            for technician in &technicians {
                tx.ledger().save(technician.clone()).await?;
            }
            tx.commit().await?;
            store.upsert_sub_service(&sub_service).await?;
            Arc::new(store)
        }
        None => {
            tracing::info!("No database configured, using the in-memory store");
            let store = InMemoryStore::new().with_sources(sources);
            for technician in &technicians {
                store.insert_technician(technician.clone()).await;
            }
            store.insert_sub_service(sub_service.clone()).await;
            Arc::new(store)
        }
    };

    let workflow = BiddingWorkflow::new(store, clock, ids)
        .with_metrics(metrics.clone());

    // === 3. Demonstrate the order lifecycle ===
    if config.run_demo {
        run_demo(&workflow, &technicians, sub_service.id).await?;
    }

    if config.metrics_enabled() {
        tracing::info!("⏳ Serving metrics, press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("🎉 Done!");
    Ok(())
}

fn demo_catalog() -> (Vec<Technician>, SubService) {
    let mut ana = Technician::new(TechnicianId(Uuid::now_v7()), "Ana");
    ana.score = 42.0;
    let mut bruno = Technician::new(TechnicianId(Uuid::now_v7()), "Bruno");
    bruno.score = 17.5;

    let sub_service = SubService::new(SubServiceId(Uuid::now_v7()), "Pipe repair", Money(250_000))
        .with_technician(ana.id)
        .with_technician(bruno.id);

    (vec![ana, bruno], sub_service)
}

async fn run_demo(
    workflow: &BiddingWorkflow,
    technicians: &[Technician],
    sub_service_id: SubServiceId,
) -> anyhow::Result<()> {
    tracing::info!("📝 Demonstrating order lifecycle");

    let tomorrow = Utc::now() + TimeDelta::days(1);
    let order = workflow
        .place_order(
            CustomerId(Uuid::now_v7()),
            sub_service_id,
            "Kitchen sink is leaking under the cabinet",
            "221B Baker Street",
            tomorrow,
        )
        .await?;

    let date = tomorrow.format("%Y-%m-%d").to_string();
    let mut suggestions = Vec::new();
    let bids = [(300_000, "09:30"), (280_000, "14:00")];
    for (technician, (price, time)) in technicians.iter().zip(bids) {
        let request = SuggestionRequest::parse(technician.id, order.id, Money(price), &date, time, "02:00")?;
        suggestions.push(workflow.submit_suggestion(request).await?);
    }

    let by_price = workflow.rank_suggestions_by_price(order.id, true).await?;
    let by_score = workflow.rank_suggestions_by_technician_score(order.id, false).await?;
    tracing::info!(
        cheapest = %by_price[0].suggested_price,
        best_rated = %by_score[0].technician_id,
        "Ranked {} suggestions",
        suggestions.len()
    );

    let chosen = &by_score[0];
    workflow.select_suggestion(order.id, chosen.id).await?;
    workflow.start_order(order.id).await?;

    let late_hours = workflow.compute_lateness_hours(order.id).await?;
    tracing::info!(late_hours, "Lateness before finishing");

    workflow
        .handle_finish_order(order.id, 5.0, Some("Quick and tidy work".to_string()))
        .await?;
    let paid = workflow
        .pay_online(order.id, chosen.suggested_price, "7391", "7391")
        .await?;
    tracing::info!(order_id = %paid.id, status = %paid.status, price = ?paid.price, "Order settled");

    for envelope in workflow.order_history(order.id).await? {
        tracing::info!(sequence = envelope.sequence_number, event = %envelope.event_type, "History");
    }
    for entry in workflow.technician_ledger(chosen.technician_id).await? {
        tracing::info!(kind = entry.adjustment.kind(), "Ledger");
    }

    Ok(())
}
