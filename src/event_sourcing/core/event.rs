use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata the journal needs.
// Generic over the event type.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Groups events written by the same workflow call
    pub correlation_id: Option<Uuid>,

    // Timing
    pub timestamp: DateTime<Utc>,

    // Additional Metadata
    pub metadata: HashMap<String, String>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            sequence_number,
            event_type: event_data.event_name().to_string(),
            event_version: E::event_version(),
            event_data,
            correlation_id: None,
            timestamp,
            metadata: HashMap::new(),
        }
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All journaled domain events implement this trait.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Name of the concrete variant, stored next to the payload
    fn event_name(&self) -> &'static str;

    fn event_version() -> i32 where Self: Sized { 1 }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> Result<E, serde_json::Error> {
    serde_json::from_str(json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    enum PingEvent {
        Pinged { count: u32 },
    }

    impl DomainEvent for PingEvent {
        fn event_name(&self) -> &'static str {
            "Pinged"
        }
    }

    #[test]
    fn test_envelope_takes_name_from_event() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            aggregate_id,
            3,
            PingEvent::Pinged { count: 1 },
            Utc::now(),
        )
        .with_correlation(correlation_id)
        .with_metadata("source", "test");

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 3);
        assert_eq!(envelope.event_type, "Pinged");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, Some(correlation_id));
        assert_eq!(envelope.metadata.get("source").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_event_payload_survives_journal_encoding() {
        let event = PingEvent::Pinged { count: 7 };
        let json = serialize_event(&event).unwrap();
        let decoded: PingEvent = deserialize_event(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
