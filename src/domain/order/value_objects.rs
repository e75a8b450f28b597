use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Amount of money in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub fn new(amount: i64) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an order. Variants are declared in lifecycle order, so the
/// derived `Ord` is the forward direction of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    AwaitingTechnicianSelection,
    AwaitingTechnicianArrival,
    Started,
    Finished,
    Paid,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::AwaitingTechnicianSelection,
        OrderStatus::AwaitingTechnicianArrival,
        OrderStatus::Started,
        OrderStatus::Finished,
        OrderStatus::Paid,
    ];

    /// Suggestions can be submitted and selected only while this holds.
    pub fn is_bidding_open(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::AwaitingTechnicianSelection)
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, OrderStatus::Finished)
    }

    /// Comments are attached to finished work only.
    pub fn accepts_comment(&self) -> bool {
        matches!(self, OrderStatus::Finished | OrderStatus::Paid)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Transition table of the order state machine.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (New, AwaitingTechnicianSelection)
                | (AwaitingTechnicianSelection, AwaitingTechnicianSelection)
                | (AwaitingTechnicianSelection, AwaitingTechnicianArrival)
                | (AwaitingTechnicianArrival, Started)
                | (Started, Finished)
                | (Finished, Paid)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::AwaitingTechnicianSelection => "AWAITING_TECHNICIAN_SELECTION",
            OrderStatus::AwaitingTechnicianArrival => "AWAITING_TECHNICIAN_ARRIVAL",
            OrderStatus::Started => "STARTED",
            OrderStatus::Finished => "FINISHED",
            OrderStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownOrderStatus(s.to_string()))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
