use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::ids::{CustomerId, OrderId, SubServiceId, SuggestionId};
use crate::event_sourcing::Aggregate;
use super::value_objects::{Money, OrderStatus};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: OrderId,
    pub version: i64,

    // Request
    pub customer_id: CustomerId,
    pub sub_service_id: SubServiceId,
    pub job_info: String,
    pub address: String,
    pub requested_at: DateTime<Utc>,
    pub placed_at: DateTime<Utc>,

    // Lifecycle
    pub status: OrderStatus,
    /// Submitted bids, in submission order. Suggestions only point back by id.
    pub suggestions: Vec<SuggestionId>,
    pub selected_suggestion_id: Option<SuggestionId>,
    pub price: Option<Money>,

    // Completion
    pub completion_score: Option<f64>,
    pub comment: Option<String>,

    #[serde(skip)]
    pub(crate) uncommitted: Vec<OrderEvent>,
}

impl Order {
    /// Create a new order in `NEW` status.
    pub fn place(
        id: OrderId,
        customer_id: CustomerId,
        sub_service_id: SubServiceId,
        job_info: impl Into<String>,
        address: impl Into<String>,
        requested_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        let job_info = job_info.into();
        let address = address.into();

        if job_info.trim().is_empty() {
            return Err(OrderError::EmptyJobInfo);
        }
        if address.trim().is_empty() {
            return Err(OrderError::EmptyAddress);
        }
        if requested_at <= now {
            return Err(OrderError::RequestedInPast);
        }

        let placed = OrderPlaced {
            customer_id,
            sub_service_id,
            job_info: job_info.clone(),
            address: address.clone(),
            requested_at,
            placed_at: now,
        };

        Ok(Self {
            id,
            version: 0,
            customer_id,
            sub_service_id,
            job_info,
            address,
            requested_at,
            placed_at: now,
            status: OrderStatus::New,
            suggestions: Vec::new(),
            selected_suggestion_id: None,
            price: None,
            completion_score: None,
            comment: None,
            uncommitted: vec![OrderEvent::Placed(placed)],
        })
    }

    pub fn ensure_bidding_open(&self) -> Result<(), OrderError> {
        if self.status.is_bidding_open() {
            Ok(())
        } else {
            Err(OrderError::BiddingClosed(self.status))
        }
    }

    pub fn has_suggestion(&self, suggestion_id: SuggestionId) -> bool {
        self.suggestions.contains(&suggestion_id)
    }

    /// Events applied since the order was loaded, oldest first.
    pub fn uncommitted_events(&self) -> &[OrderEvent] {
        &self.uncommitted
    }

    pub fn take_uncommitted(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.uncommitted)
    }

    fn ensure_transition(&self, to: OrderStatus) -> Result<(), OrderError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(OrderError::InvalidStatusTransition { from: self.status, to })
        }
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_event(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Placed(e) => {
                self.customer_id = e.customer_id;
                self.sub_service_id = e.sub_service_id;
                self.job_info = e.job_info.clone();
                self.address = e.address.clone();
                self.requested_at = e.requested_at;
                self.placed_at = e.placed_at;
                self.status = OrderStatus::New;
            }
            OrderEvent::SuggestionReceived(e) => {
                self.suggestions.push(e.suggestion_id);
                self.status = OrderStatus::AwaitingTechnicianSelection;
            }
            OrderEvent::SuggestionSelected(e) => {
                self.selected_suggestion_id = Some(e.suggestion_id);
                self.price = Some(e.price);
                self.status = OrderStatus::AwaitingTechnicianArrival;
            }
            OrderEvent::Started(_) => {
                self.status = OrderStatus::Started;
            }
            OrderEvent::Finished(e) => {
                self.completion_score = Some(e.completion_score);
                self.status = OrderStatus::Finished;
            }
            OrderEvent::Commented(e) => {
                self.comment = Some(e.comment.clone());
            }
            OrderEvent::Paid(_) => {
                self.status = OrderStatus::Paid;
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::AddSuggestion { suggestion_id } => {
                self.ensure_bidding_open()?;
                if self.has_suggestion(*suggestion_id) {
                    return Err(OrderError::DuplicateSuggestion(*suggestion_id));
                }

                Ok(vec![OrderEvent::SuggestionReceived(SuggestionReceived {
                    suggestion_id: *suggestion_id,
                })])
            }

            OrderCommand::SelectSuggestion { suggestion_id, price } => {
                // Membership is checked before status, nothing changes on failure
                if !self.has_suggestion(*suggestion_id) {
                    return Err(OrderError::SuggestionNotInOrder(*suggestion_id));
                }
                if !self.status.is_bidding_open() {
                    return Err(OrderError::SelectionClosed(self.status));
                }

                Ok(vec![OrderEvent::SuggestionSelected(SuggestionSelected {
                    suggestion_id: *suggestion_id,
                    price: *price,
                })])
            }

            OrderCommand::Start { at } => {
                self.ensure_transition(OrderStatus::Started)?;

                Ok(vec![OrderEvent::Started(OrderStarted { started_at: *at })])
            }

            OrderCommand::Finish { completion_score, at } => {
                if !completion_score.is_finite() || *completion_score < 0.0 {
                    return Err(OrderError::InvalidCompletionScore(*completion_score));
                }
                self.ensure_transition(OrderStatus::Finished)?;

                Ok(vec![OrderEvent::Finished(OrderFinished {
                    completion_score: *completion_score,
                    finished_at: *at,
                })])
            }

            OrderCommand::AddComment { comment } => {
                let comment = comment.trim();
                if comment.is_empty() {
                    return Err(OrderError::EmptyComment);
                }
                if !self.status.accepts_comment() {
                    return Err(OrderError::CommentNotAllowed(self.status));
                }

                Ok(vec![OrderEvent::Commented(OrderCommented {
                    comment: comment.to_string(),
                })])
            }

            OrderCommand::MarkPaid { amount, at } => {
                if self.selected_suggestion_id.is_none() {
                    return Err(OrderError::NoSelectedSuggestion);
                }
                if !self.status.is_payable() {
                    return Err(OrderError::NotPayable(self.status));
                }
                if amount.amount() <= 0 {
                    return Err(OrderError::NonPositivePayment(*amount));
                }

                Ok(vec![OrderEvent::Paid(OrderPaid {
                    amount: *amount,
                    paid_at: *at,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn record_uncommitted(&mut self, events: &[Self::Event]) {
        self.uncommitted.extend_from_slice(events);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
