use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::domain::ids::{CustomerId, SubServiceId, SuggestionId};
use crate::event_sourcing::DomainEvent;
use super::value_objects::Money;

// ============================================================================
// Order Events - journaled by the order store on every save
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    SuggestionReceived(SuggestionReceived),
    SuggestionSelected(SuggestionSelected),
    Started(OrderStarted),
    Finished(OrderFinished),
    Commented(OrderCommented),
    Paid(OrderPaid),
}

impl DomainEvent for OrderEvent {
    fn event_name(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::SuggestionReceived(_) => "OrderSuggestionReceived",
            OrderEvent::SuggestionSelected(_) => "OrderSuggestionSelected",
            OrderEvent::Started(_) => "OrderStarted",
            OrderEvent::Finished(_) => "OrderFinished",
            OrderEvent::Commented(_) => "OrderCommented",
            OrderEvent::Paid(_) => "OrderPaid",
        }
    }
}

/// Customer placed a new service request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub customer_id: CustomerId,
    pub sub_service_id: SubServiceId,
    pub job_info: String,
    pub address: String,
    pub requested_at: DateTime<Utc>,
    pub placed_at: DateTime<Utc>,
}

/// A technician's bid was attached to the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReceived {
    pub suggestion_id: SuggestionId,
}

/// Customer picked a bid; closes the bidding round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSelected {
    pub suggestion_id: SuggestionId,
    pub price: Money,
}

/// Technician arrived on site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStarted {
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFinished {
    pub completion_score: f64,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCommented {
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaid {
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}
