// ============================================================================
// Order-Bidding Workflow
// ============================================================================
//
// Suggestion submission, selection, ranking, lateness, completion and
// payment, each run as one store transaction.
//
// ============================================================================

mod engine;
pub mod lateness;
pub mod ranking;

pub use engine::BiddingWorkflow;
pub use lateness::lateness_hours;
