// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (OrderStatus, Money)
// - Events (OrderPlaced, SuggestionSelected, OrderPaid, ...)
// - Commands (AddSuggestion, SelectSuggestion, Finish, ...)
// - Errors (OrderError)
// - Aggregate (Order)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
