use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, IdGenerator};
use crate::domain::{
    CustomerId, LedgerEntry, Money, Order, OrderCommand, OrderEvent, OrderId, SubServiceId,
    Suggestion, SuggestionId, SuggestionRequest, TechnicianId,
};
use crate::error::{ErrorKind, MarketplaceError};
use crate::event_sourcing::{Aggregate, EventEnvelope};
use crate::metrics::{Metrics, OUTCOME_OK};
use crate::store::{Store, StoreTransaction};
use super::lateness::lateness_hours;
use super::ranking;

// ============================================================================
// Bidding Workflow Engine
// ============================================================================
//
// Every public operation opens one store transaction, runs its checks in a
// fixed order, writes, and commits. An early return drops the transaction,
// which discards everything written so far.
//
// ============================================================================

pub struct BiddingWorkflow {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    metrics: Option<Arc<Metrics>>,
}

impl BiddingWorkflow {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            store,
            clock,
            ids,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Create an order in `NEW` status for a catalog sub-service.
    pub async fn place_order(
        &self,
        customer_id: CustomerId,
        sub_service_id: SubServiceId,
        job_info: &str,
        address: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<Order, MarketplaceError> {
        let started = Instant::now();
        let result = self
            .place_order_tx(customer_id, sub_service_id, job_info, address, requested_at)
            .await;
        self.finish_operation("place_order", started, result)
    }

    /// Record a technician's bid on an order.
    ///
    /// Checks, in order: the order exists, bidding is still open, the
    /// technician offers the order's sub-service, the price is at least the
    /// base wage, and the suggested start lies in the future. The order and
    /// the new suggestion are written together or not at all.
    pub async fn submit_suggestion(&self, request: SuggestionRequest) -> Result<Suggestion, MarketplaceError> {
        let started = Instant::now();
        let result = self.submit_suggestion_tx(request).await;
        self.finish_operation("submit_suggestion", started, result)
    }

    /// Customer picks one of the bids on their order.
    pub async fn select_suggestion(
        &self,
        order_id: OrderId,
        suggestion_id: SuggestionId,
    ) -> Result<Order, MarketplaceError> {
        let started = Instant::now();
        let result = self.select_suggestion_tx(order_id, suggestion_id).await;
        self.finish_operation("select_suggestion", started, result)
    }

    pub async fn rank_suggestions_by_technician_score(
        &self,
        order_id: OrderId,
        ascending: bool,
    ) -> Result<Vec<Suggestion>, MarketplaceError> {
        let started = Instant::now();
        let result = self.rank_by_score_tx(order_id, ascending).await;
        self.finish_operation("rank_by_technician_score", started, result)
    }

    pub async fn rank_suggestions_by_price(
        &self,
        order_id: OrderId,
        ascending: bool,
    ) -> Result<Vec<Suggestion>, MarketplaceError> {
        let started = Instant::now();
        let result = self.rank_by_price_tx(order_id, ascending).await;
        self.finish_operation("rank_by_price", started, result)
    }

    /// Whole hours the selected technician is past their promised completion
    /// time, measured against the current clock.
    pub async fn compute_lateness_hours(&self, order_id: OrderId) -> Result<u64, MarketplaceError> {
        let started = Instant::now();
        let result = self.lateness_tx(order_id).await;
        self.finish_operation("compute_lateness_hours", started, result)
    }

    /// Technician arrived on site.
    pub async fn start_order(&self, order_id: OrderId) -> Result<Order, MarketplaceError> {
        let started = Instant::now();
        let result = self.start_order_tx(order_id).await;
        self.finish_operation("start_order", started, result)
    }

    /// Close the job: finish the order, attach the optional comment, credit
    /// the completion score to the technician and, when late, take away one
    /// point per late hour as a separate ledger adjustment.
    pub async fn handle_finish_order(
        &self,
        order_id: OrderId,
        completion_score: f64,
        comment: Option<String>,
    ) -> Result<Order, MarketplaceError> {
        let started = Instant::now();
        let result = self.finish_order_tx(order_id, completion_score, comment).await;
        self.finish_operation("finish_order", started, result)
    }

    pub async fn pay_online(
        &self,
        order_id: OrderId,
        amount: Money,
        captcha_input: &str,
        expected_captcha: &str,
    ) -> Result<Order, MarketplaceError> {
        let started = Instant::now();
        let result = self
            .pay_online_tx(order_id, amount, captcha_input, expected_captcha)
            .await;
        self.finish_operation("pay_online", started, result)
    }

    pub async fn order_history(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<EventEnvelope<OrderEvent>>, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        tx.orders().read_by_id(order_id).await?;
        Ok(tx.orders().history(order_id).await?)
    }

    pub async fn technician_ledger(&self, technician_id: TechnicianId) -> Result<Vec<LedgerEntry>, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        tx.ledger().find_by_id(technician_id).await?;
        Ok(tx.ledger().entries(technician_id).await?)
    }

    // ========================================================================
    // Transactional Bodies
    // ========================================================================

    async fn place_order_tx(
        &self,
        customer_id: CustomerId,
        sub_service_id: SubServiceId,
        job_info: &str,
        address: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        tx.catalog().find_sub_service(sub_service_id).await?;

        let order = Order::place(
            OrderId::from(self.ids.next_id()),
            customer_id,
            sub_service_id,
            job_info,
            address,
            requested_at,
            self.clock.now(),
        )?;

        let order = tx.orders().save(order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, customer_id = %customer_id, sub_service_id = %sub_service_id, "✅ Order placed");
        Ok(order)
    }

    async fn submit_suggestion_tx(&self, request: SuggestionRequest) -> Result<Suggestion, MarketplaceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut order = tx.orders().find_by_id(request.order_id).await?;
        order.ensure_bidding_open()?;

        let sub_service = tx.catalog().find_sub_service(order.sub_service_id).await?;
        if !sub_service.is_offered_by(request.technician_id) {
            return Err(MarketplaceError::Forbidden(
                "Technician does not offer this sub-service".to_string(),
            ));
        }
        tx.ledger().find_by_id(request.technician_id).await?;

        if request.suggested_price < sub_service.base_wage {
            return Err(MarketplaceError::InvalidInput(format!(
                "Price {} is below the base wage {}",
                request.suggested_price, sub_service.base_wage
            )));
        }
        if request.scheduled_at() <= now {
            return Err(MarketplaceError::InvalidInput(
                "Suggested date/time cannot be in the past".to_string(),
            ));
        }
        request.promised_completion()?;

        let suggestion = request.into_suggestion(SuggestionId::from(self.ids.next_id()), now);
        order.execute(&OrderCommand::AddSuggestion { suggestion_id: suggestion.id })?;

        debug!(order_id = %order.id, suggestion_id = %suggestion.id, "Saving order and suggestion");
        tx.orders().save(order).await?;
        let suggestion = tx.suggestions().save(suggestion).await?;
        tx.commit().await?;

        info!(
            order_id = %suggestion.order_id,
            suggestion_id = %suggestion.id,
            technician_id = %suggestion.technician_id,
            price = %suggestion.suggested_price,
            "✅ Suggestion submitted"
        );
        Ok(suggestion)
    }

    async fn select_suggestion_tx(
        &self,
        order_id: OrderId,
        suggestion_id: SuggestionId,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.store.begin().await?;

        let suggestion = tx.suggestions().find_by_id(suggestion_id).await?;
        let mut order = tx.orders().find_by_id(order_id).await?;
        order.execute(&OrderCommand::SelectSuggestion {
            suggestion_id,
            price: suggestion.suggested_price,
        })?;

        let order = tx.orders().save(order).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            suggestion_id = %suggestion_id,
            technician_id = %suggestion.technician_id,
            "✅ Suggestion selected"
        );
        Ok(order)
    }

    async fn rank_by_price_tx(&self, order_id: OrderId, ascending: bool) -> Result<Vec<Suggestion>, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        let suggestions = load_suggestions(tx.as_mut(), order_id).await?;
        Ok(ranking::by_price(suggestions, ascending))
    }

    async fn rank_by_score_tx(&self, order_id: OrderId, ascending: bool) -> Result<Vec<Suggestion>, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        let suggestions = load_suggestions(tx.as_mut(), order_id).await?;

        let mut scored = Vec::with_capacity(suggestions.len());
        for suggestion in suggestions {
            let technician = tx.ledger().find_by_id(suggestion.technician_id).await?;
            scored.push((suggestion, technician.score));
        }
        Ok(ranking::by_technician_score(scored, ascending))
    }

    async fn lateness_tx(&self, order_id: OrderId) -> Result<u64, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        let order = tx.orders().read_by_id(order_id).await?;
        let suggestion = selected_suggestion(tx.as_mut(), &order).await?;
        Ok(lateness_hours(suggestion.promised_completion()?, self.clock.now()))
    }

    async fn start_order_tx(&self, order_id: OrderId) -> Result<Order, MarketplaceError> {
        let mut tx = self.store.begin().await?;
        let order = tx.orders().start_order(order_id, self.clock.now()).await?;
        tx.commit().await?;

        info!(order_id = %order_id, "🔧 Order started");
        Ok(order)
    }

    async fn finish_order_tx(
        &self,
        order_id: OrderId,
        completion_score: f64,
        comment: Option<String>,
    ) -> Result<Order, MarketplaceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut order = tx.orders().finish_order(order_id, completion_score, now).await?;
        if let Some(comment) = comment {
            order = tx.orders().add_comment(order_id, comment).await?;
        }

        let suggestion = selected_suggestion(tx.as_mut(), &order).await?;
        let technician_id = suggestion.technician_id;

        let mut adjustments = vec![tx.ledger().add_points(technician_id, completion_score).await?];

        let late_hours = lateness_hours(suggestion.promised_completion()?, now);
        if late_hours > 0 {
            warn!(order_id = %order_id, technician_id = %technician_id, late_hours, "⏰ Order finished late");
            adjustments.push(tx.ledger().reduce_points(technician_id, late_hours as f64).await?);
        }

        tx.commit().await?;

        if let Some(metrics) = &self.metrics {
            metrics.observe_lateness(late_hours);
            for entry in &adjustments {
                metrics.record_ledger_adjustment(entry.adjustment.kind());
            }
        }
        info!(
            order_id = %order_id,
            technician_id = %technician_id,
            completion_score,
            late_hours,
            "✅ Order finished"
        );
        Ok(order)
    }

    async fn pay_online_tx(
        &self,
        order_id: OrderId,
        amount: Money,
        captcha_input: &str,
        expected_captcha: &str,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.store.begin().await?;

        let mut order = tx.orders().find_by_id(order_id).await?;
        // selection and status are checked by the aggregate before the captcha
        order.execute(&OrderCommand::MarkPaid { amount, at: self.clock.now() })?;
        if captcha_input != expected_captcha {
            return Err(MarketplaceError::InvalidInput("Captcha mismatch".to_string()));
        }

        let suggestion = selected_suggestion(tx.as_mut(), &order).await?;
        let credit = tx.ledger().add_credit(suggestion.technician_id, amount).await?;
        let order = tx.orders().save(order).await?;
        tx.commit().await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_ledger_adjustment(credit.adjustment.kind());
        }
        info!(
            order_id = %order_id,
            technician_id = %suggestion.technician_id,
            amount = %amount,
            "💰 Order paid"
        );
        Ok(order)
    }

    // ========================================================================
    // Outcome Reporting
    // ========================================================================

    fn finish_operation<T>(
        &self,
        operation: &'static str,
        started: Instant,
        result: Result<T, MarketplaceError>,
    ) -> Result<T, MarketplaceError> {
        let outcome = match &result {
            Ok(_) => OUTCOME_OK,
            Err(e) => {
                match e.kind() {
                    ErrorKind::PersistenceFailure => error!(operation, error = %e, "❌ Workflow operation failed"),
                    kind => warn!(operation, kind = kind.as_str(), reason = e.message(), "Workflow operation rejected"),
                }
                e.kind().as_str()
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_operation(operation, outcome, started.elapsed());
        }
        result
    }
}

async fn load_suggestions(
    tx: &mut dyn StoreTransaction,
    order_id: OrderId,
) -> Result<Vec<Suggestion>, MarketplaceError> {
    let order = tx.orders().read_by_id(order_id).await?;
    let mut suggestions = Vec::with_capacity(order.suggestions.len());
    for suggestion_id in &order.suggestions {
        suggestions.push(tx.suggestions().find_by_id(*suggestion_id).await?);
    }
    Ok(suggestions)
}

async fn selected_suggestion(tx: &mut dyn StoreTransaction, order: &Order) -> Result<Suggestion, MarketplaceError> {
    let suggestion_id = order.selected_suggestion_id.ok_or_else(|| {
        MarketplaceError::NotFound("Cannot find the technician for this order".to_string())
    })?;
    Ok(tx.suggestions().find_by_id(suggestion_id).await?)
}
