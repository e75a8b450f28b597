use super::value_objects::{Money, OrderStatus};
use crate::domain::ids::SuggestionId;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot send a suggestion for this order (status {0})")]
    BiddingClosed(OrderStatus),

    #[error("Cannot select suggestions anymore (status {0})")]
    SelectionClosed(OrderStatus),

    #[error("Suggestion {0} not found in your orders")]
    SuggestionNotInOrder(SuggestionId),

    #[error("Suggestion {0} was already submitted for this order")]
    DuplicateSuggestion(SuggestionId),

    #[error("Cannot find the technician for this order")]
    NoSelectedSuggestion,

    #[error("Cannot pay now (status {0})")]
    NotPayable(OrderStatus),

    #[error("Payment amount must be positive, got {0}")]
    NonPositivePayment(Money),

    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Cannot comment on an order in status {0}")]
    CommentNotAllowed(OrderStatus),

    #[error("Comment cannot be empty")]
    EmptyComment,

    #[error("Invalid completion score: {0}")]
    InvalidCompletionScore(f64),

    #[error("Job description cannot be empty")]
    EmptyJobInfo,

    #[error("Address cannot be empty")]
    EmptyAddress,

    #[error("Requested date/time cannot be in the past")]
    RequestedInPast,
}
