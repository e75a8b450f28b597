// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Aggregates and value objects of the marketplace. Nothing in here touches
// storage, clocks or logging; the workflow engine feeds it ids and time.
//
// ============================================================================

pub mod ids;
pub mod order;
pub mod suggestion;
pub mod technician;
pub mod catalog;

pub use ids::*;
pub use order::{Money, Order, OrderCommand, OrderError, OrderEvent, OrderStatus};
pub use suggestion::{Suggestion, SuggestionError, SuggestionRequest, WorkDuration};
pub use technician::{LedgerAdjustment, LedgerEntry, Technician};
pub use catalog::SubService;
