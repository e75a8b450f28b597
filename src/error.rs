use crate::domain::{OrderError, SuggestionError};
use crate::store::StoreError;

// ============================================================================
// Workflow Boundary Errors
// ============================================================================
//
// Every failure leaving the workflow engine is one of five kinds. Storage
// errors are translated here and nowhere else.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InvalidInput,
    Forbidden,
    PersistenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::PersistenceFailure => "persistence_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarketplaceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Persistence failure: {message} ({cause})")]
    PersistenceFailure { message: String, cause: String },
}

impl MarketplaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketplaceError::NotFound(_) => ErrorKind::NotFound,
            MarketplaceError::InvalidState(_) => ErrorKind::InvalidState,
            MarketplaceError::InvalidInput(_) => ErrorKind::InvalidInput,
            MarketplaceError::Forbidden(_) => ErrorKind::Forbidden,
            MarketplaceError::PersistenceFailure { .. } => ErrorKind::PersistenceFailure,
        }
    }

    /// Human-readable message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            MarketplaceError::NotFound(m)
            | MarketplaceError::InvalidState(m)
            | MarketplaceError::InvalidInput(m)
            | MarketplaceError::Forbidden(m) => m,
            MarketplaceError::PersistenceFailure { message, .. } => message,
        }
    }
}

impl From<OrderError> for MarketplaceError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::SuggestionNotInOrder(_) | OrderError::NoSelectedSuggestion => {
                MarketplaceError::NotFound(message)
            }
            OrderError::BiddingClosed(_)
            | OrderError::SelectionClosed(_)
            | OrderError::DuplicateSuggestion(_)
            | OrderError::NotPayable(_)
            | OrderError::InvalidStatusTransition { .. }
            | OrderError::CommentNotAllowed(_) => MarketplaceError::InvalidState(message),
            OrderError::EmptyComment
            | OrderError::NonPositivePayment(_)
            | OrderError::InvalidCompletionScore(_)
            | OrderError::EmptyJobInfo
            | OrderError::EmptyAddress
            | OrderError::RequestedInPast => MarketplaceError::InvalidInput(message),
        }
    }
}

impl From<SuggestionError> for MarketplaceError {
    fn from(err: SuggestionError) -> Self {
        MarketplaceError::InvalidInput(err.to_string())
    }
}

impl From<StoreError> for MarketplaceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                MarketplaceError::NotFound(format!("{entity} {id} does not exist"))
            }
            other => MarketplaceError::PersistenceFailure {
                message: "Storage rejected the operation".to_string(),
                cause: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Money, OrderStatus, SuggestionId};
    use uuid::Uuid;

    #[test]
    fn test_order_errors_map_to_kinds() {
        let cases = [
            (OrderError::BiddingClosed(OrderStatus::Paid), ErrorKind::InvalidState),
            (OrderError::SelectionClosed(OrderStatus::Started), ErrorKind::InvalidState),
            (OrderError::NotPayable(OrderStatus::New), ErrorKind::InvalidState),
            (OrderError::SuggestionNotInOrder(SuggestionId(Uuid::nil())), ErrorKind::NotFound),
            (OrderError::NoSelectedSuggestion, ErrorKind::NotFound),
            (OrderError::EmptyComment, ErrorKind::InvalidInput),
            (OrderError::NonPositivePayment(Money(0)), ErrorKind::InvalidInput),
            (OrderError::InvalidCompletionScore(f64::NAN), ErrorKind::InvalidInput),
        ];

        for (err, kind) in cases {
            assert_eq!(MarketplaceError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_store_not_found_stays_not_found() {
        let err: MarketplaceError = StoreError::NotFound {
            entity: "Order",
            id: "42".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("42"));
    }

    #[test]
    fn test_store_failure_carries_cause() {
        let err: MarketplaceError = StoreError::Backend("disk full".to_string()).into();
        match err {
            MarketplaceError::PersistenceFailure { cause, .. } => assert!(cause.contains("disk full")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_messages_are_readable() {
        let err: MarketplaceError = OrderError::NoSelectedSuggestion.into();
        assert_eq!(err.message(), "Cannot find the technician for this order");
        assert_eq!(err.to_string(), "Not found: Cannot find the technician for this order");
    }
}
