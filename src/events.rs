//! Domain events (spec §9: "represent events as a tagged sum ... subscribers
//! are registered at init" — replacing the source's per-class event
//! hierarchy). Commands and workers emit one of these after a successful
//! transaction; this crate ships the type and an in-process publisher, not
//! any particular subscriber (persistence of an outbox, webhooks, etc. are
//! the HTTP layer's concern, out of scope per spec §1).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    Dataset,
    Ref,
    Commit,
    Job,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub aggregate_id: String,
    pub aggregate_type: AggregateType,
    pub payload: Value,
    pub user_id: i64,
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(
        event_type: &'static str,
        aggregate_type: AggregateType,
        aggregate_id: impl Into<String>,
        user_id: i64,
        correlation_id: Uuid,
        payload: Value,
    ) -> Self {
        Self {
            event_type,
            aggregate_id: aggregate_id.into(),
            aggregate_type,
            payload,
            user_id,
            correlation_id,
            occurred_at: Utc::now(),
        }
    }
}

/// Registered at process init (spec §9); fans an event out to every
/// subscriber, swallowing nothing — a subscriber failure is the
/// subscriber's problem to log, not a reason to fail the command that just
/// committed.
pub trait EventSubscriber: Send + Sync {
    fn handle(&self, event: &DomainEvent);
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Box<dyn EventSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!(
            event_type = event.event_type,
            aggregate_type = ?event.aggregate_type,
            aggregate_id = %event.aggregate_id,
            "publishing domain event"
        );
        for subscriber in &self.subscribers {
            subscriber.handle(&event);
        }
    }
}

/// An [`EventSubscriber`] that logs every event at `info` via `tracing`,
/// matching the teacher's preference for structured fields over string
/// interpolation. Useful as the default subscriber when nothing else is
/// registered.
pub struct TracingSubscriber;

impl EventSubscriber for TracingSubscriber {
    fn handle(&self, event: &DomainEvent) {
        tracing::info!(
            event_type = event.event_type,
            aggregate_type = ?event.aggregate_type,
            aggregate_id = %event.aggregate_id,
            user_id = event.user_id,
            "{}",
            event.event_type
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSubscriber(Arc<AtomicUsize>);
    impl EventSubscriber for CountingSubscriber {
        fn handle(&self, _event: &DomainEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(CountingSubscriber(counter.clone())));
        bus.subscribe(Box::new(CountingSubscriber(counter.clone())));
        bus.publish(DomainEvent::new(
            "dataset.created",
            AggregateType::Dataset,
            "1",
            7,
            Uuid::new_v4(),
            serde_json::json!({}),
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
