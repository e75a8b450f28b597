// Private module declaration
mod server;

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the bidding workflow
// ============================================================================
//
// Provides:
// - Workflow operation outcomes (per operation, per error kind)
// - Workflow operation latency
// - Technician ledger adjustments (score added/reduced, credit added)
// - Observed order lateness at finish time
//
// The workflow runs fine without a `Metrics` instance attached; everything
// registered here is scraped via /metrics.
// ============================================================================

/// Outcome label used for operations that returned `Ok`
pub const OUTCOME_OK: &str = "ok";

pub struct Metrics {
    registry: Registry,

    // Workflow Metrics
    pub operations_total: IntCounterVec,
    pub operation_duration: HistogramVec,

    // Ledger Metrics
    pub ledger_adjustments_total: IntCounterVec,
    pub order_lateness_hours: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Workflow Metrics
        let operations_total = IntCounterVec::new(
            Opts::new("workflow_operations_total", "Workflow operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("workflow_operation_duration_seconds", "Workflow operation duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        // Ledger Metrics
        let ledger_adjustments_total = IntCounterVec::new(
            Opts::new("technician_ledger_adjustments_total", "Technician score and credit adjustments"),
            &["kind"],
        )?;
        registry.register(Box::new(ledger_adjustments_total.clone()))?;

        let order_lateness_hours = Histogram::with_opts(
            HistogramOpts::new("order_lateness_hours", "Whole hours past the promised completion time")
                .buckets(vec![0.0, 1.0, 2.0, 4.0, 8.0, 24.0, 72.0]),
        )?;
        registry.register(Box::new(order_lateness_hours.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration,
            ledger_adjustments_total,
            order_lateness_hours,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record one workflow call; `outcome` is `OUTCOME_OK` or an error kind
    pub fn record_operation(&self, operation: &str, outcome: &str, elapsed: Duration) {
        self.operations_total.with_label_values(&[operation, outcome]).inc();
        self.operation_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_ledger_adjustment(&self, kind: &str) {
        self.ledger_adjustments_total.with_label_values(&[kind]).inc();
    }

    pub fn observe_lateness(&self, hours: u64) {
        self.order_lateness_hours.observe(hours as f64);
    }
}
