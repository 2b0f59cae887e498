// src/events.rs - Alarm set/reset notifications
use crate::registry::{AlarmState, AlarmType};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Event category alarm subscribers listen on
pub const ALARM_EVENT_CATEGORY: &str = "alm";

/// Kind of confirmed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmEventKind {
    /// Alarm became active, or moved to a band at least as severe
    Set,
    /// Alarm cleared, or moved to a less severe band
    Reset,
}

/// Notification published on every confirmed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub kind: AlarmEventKind,
    pub name: String,
    pub alarm_type: AlarmType,
    /// State after the transition
    pub state: AlarmState,
    pub timestamp: DateTime<Utc>,
}

impl AlarmEvent {
    pub fn new(kind: AlarmEventKind, name: impl Into<String>, state: AlarmState) -> Self {
        Self {
            kind,
            name: name.into(),
            alarm_type: state.alarm_type(),
            state,
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out of alarm events to any number of subscribers
///
/// Publishing only enqueues, so it never blocks a poll tick or timer
/// callback. Slow subscribers lag and lose the oldest events.
#[derive(Debug)]
pub struct EventPublisher {
    category: &'static str,
    tx: broadcast::Sender<AlarmEvent>,
    published: AtomicU64,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            category: ALARM_EVENT_CATEGORY,
            tx,
            published: AtomicU64::new(0),
        }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Enqueue `event` for every current subscriber
    ///
    /// Returns the number of subscribers reached; zero is not an error.
    pub fn publish(&self, event: AlarmEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(
            "[{}] {:?} '{}' -> {}",
            self.category, event.kind, event.name, event.state
        );
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events published since creation
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
