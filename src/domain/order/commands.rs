use chrono::{DateTime, Utc};

use super::value_objects::Money;
use crate::domain::ids::SuggestionId;

// ============================================================================
// Order Commands - Represent caller intent
// ============================================================================
//
// Creation is not a command: `Order::place` builds the first state.
// Timestamps come from the workflow clock, never from `Utc::now()` here.
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    AddSuggestion {
        suggestion_id: SuggestionId,
    },
    SelectSuggestion {
        suggestion_id: SuggestionId,
        price: Money,
    },
    Start {
        at: DateTime<Utc>,
    },
    Finish {
        completion_score: f64,
        at: DateTime<Utc>,
    },
    AddComment {
        comment: String,
    },
    MarkPaid {
        amount: Money,
        at: DateTime<Utc>,
    },
}
