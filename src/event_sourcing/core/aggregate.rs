use uuid::Uuid;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything changes
// 2. A successful command emits events describing what happened
// 3. State only changes by applying those events
// 4. Applied events are kept as uncommitted until the owning store saves them
//
// Aggregates here are state-stored: the store persists the current snapshot
// and journals the uncommitted events next to it in the same write.
//
// ============================================================================

/// Generic Aggregate trait - all journaled aggregates implement this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event: Clone;
    type Command;
    type Error;

    /// Apply an event to update state
    fn apply_event(&mut self, event: &Self::Event);

    /// Handle command and emit events (business logic, no mutation)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Get aggregate ID
    fn aggregate_id(&self) -> Uuid;

    /// Version the aggregate was loaded at (number of journaled events)
    fn version(&self) -> i64;

    /// Record events that still have to be journaled by the store
    fn record_uncommitted(&mut self, events: &[Self::Event]);

    /// Validate a command, apply the resulting events and keep them as uncommitted.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle_command(command)?;
        for event in &events {
            self.apply_event(event);
        }
        self.record_uncommitted(&events);
        Ok(events)
    }
}
