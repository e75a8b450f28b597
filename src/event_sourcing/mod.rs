// ============================================================================
// Event Journal Infrastructure
// ============================================================================
//
// Generic, reusable aggregate/event abstractions.
// Domain-specific code is in src/domain/, persistence in src/store/.
//
// ============================================================================

mod core;

pub use self::core::*;
