//! Event timeline types.
//!
//! An [`EventSequence`] is the collaborator-facing view of a timeline: an
//! ordered list of typed, timestamped occurrences. The matching engine only
//! ever reads per-type timestamp vectors out of it; storage, generation and
//! log-format parsing live outside this crate.

use serde::{Deserialize, Serialize};

/// A single occurrence of an event type on the shared timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Categorical type of the occurrence (e.g. `"A"`, `"request"`).
    pub event_type: String,

    /// Position on the shared timeline, in caller-defined units.
    pub timestamp: f64,
}

impl Event {
    /// Create a new event.
    pub fn new(event_type: impl Into<String>, timestamp: f64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
        }
    }
}

/// An ordered sequence of events from one timeline.
///
/// Events are kept sorted by timestamp regardless of insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSequence {
    events: Vec<Event>,
}

impl EventSequence {
    /// Build a sequence from a list of events, sorting by timestamp.
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());
        Self { events }
    }

    /// Insert an event, preserving timestamp order.
    pub fn push(&mut self, event: Event) {
        let pos = self
            .events
            .partition_point(|e| e.timestamp <= event.timestamp);
        self.events.insert(pos, event);
    }

    /// Number of events in the sequence.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the sequence holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events in timestamp order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Ordered timestamps of every occurrence of `event_type`.
    pub fn timestamps(&self, event_type: &str) -> Vec<f64> {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| e.timestamp)
            .collect()
    }

    /// Distinct event types, in order of first occurrence.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for event in &self.events {
            if !types.contains(&event.event_type.as_str()) {
                types.push(&event.event_type);
            }
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sequence() -> EventSequence {
        EventSequence::new(vec![
            Event::new("B", 109.0),
            Event::new("A", 34.0),
            Event::new("B", 149.0),
            Event::new("A", 73.0),
        ])
    }

    #[test]
    fn test_events_sorted_by_timestamp() {
        let seq = sample_sequence();
        let stamps: Vec<f64> = seq.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![34.0, 73.0, 109.0, 149.0]);
    }

    #[test]
    fn test_timestamps_filters_by_type() {
        let seq = sample_sequence();
        assert_eq!(seq.timestamps("A"), vec![34.0, 73.0]);
        assert_eq!(seq.timestamps("B"), vec![109.0, 149.0]);
        assert!(seq.timestamps("C").is_empty());
    }

    #[test]
    fn test_event_types_first_seen_order() {
        let seq = sample_sequence();
        assert_eq!(seq.event_types(), vec!["A", "B"]);
    }

    #[test]
    fn test_push_keeps_order() {
        let mut seq = sample_sequence();
        seq.push(Event::new("C", 50.0));
        let stamps: Vec<f64> = seq.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![34.0, 50.0, 73.0, 109.0, 149.0]);
    }

    #[test]
    fn test_json_round_trip() {
        let seq = sample_sequence();
        let json = serde_json::to_string(&seq).unwrap();
        let back: EventSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), seq.len());
        assert_eq!(back.timestamps("A"), seq.timestamps("A"));
    }
}
