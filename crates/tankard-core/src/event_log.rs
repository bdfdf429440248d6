//! Bounded FIFO event log with strictly increasing sequence numbers.

use std::collections::VecDeque;

use contracts::{clock_stamp, Event, EventType, SCHEMA_VERSION_V1};
use serde_json::Value;

#[derive(Debug)]
pub struct EventLog {
    session_id: String,
    entries: VecDeque<Event>,
    capacity: usize,
    next_sequence: u64,
}

impl EventLog {
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            session_id: session_id.into(),
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            next_sequence: 1,
        }
    }

    /// Rebuild a log from persisted state. The sequence counter continues
    /// where the saved session left off so ordering survives a reload.
    pub fn restore(
        session_id: impl Into<String>,
        capacity: usize,
        next_sequence: u64,
        entries: Vec<Event>,
    ) -> Self {
        let mut log = Self::new(session_id, capacity);
        log.next_sequence = next_sequence.max(1);
        for event in entries {
            log.entries.push_back(event);
            while log.entries.len() > log.capacity {
                log.entries.pop_front();
            }
        }
        log
    }

    /// Append one event and return its sequence number. Oldest entries are
    /// evicted once capacity is reached; evicted events keep their numbers,
    /// the counter never resets.
    pub fn append(
        &mut self,
        game_time: f64,
        event_type: EventType,
        details: Option<Value>,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);

        if let Some(last) = self.entries.back() {
            debug_assert!(last.sequence < sequence, "event sequence regressed");
            if last.sequence >= sequence {
                tracing::error!(
                    last = last.sequence,
                    next = sequence,
                    "event sequence regression detected"
                );
            }
        }

        self.entries.push_back(Event {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: self.session_id.clone(),
            sequence,
            game_time,
            created_at: clock_stamp(game_time),
            event_type,
            details,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        sequence
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    /// The `count` most recent events, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Event> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }
}
