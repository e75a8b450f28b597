// ============================================================================
// Suggestion Domain - technician bids on orders
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod entity;

pub use value_objects::*;
pub use errors::*;
pub use entity::*;
