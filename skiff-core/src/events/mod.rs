//! Event bus for SKIFF lifecycle events.
//!
//! Publish/subscribe over a broadcast channel. The lifecycle controller
//! publishes; the CLI subscribes to render progress.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::debug;

/// Maximum number of events buffered in the broadcast channel.
const EVENT_BUFFER_SIZE: usize = 256;

/// Event types for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    // Service events
    ServiceStarting,
    ServiceStarted,
    ServiceStopped,
    ServiceFailed,

    // Stack events
    StackUp,
    StackDown,
    StackFailed,

    // Resource events
    VolumeCreated,
    VolumeRemoved,
    NetworkCreated,
    NetworkRemoved,
}

impl EventType {
    /// Get the event type string (e.g., "service.started").
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ServiceStarting => "service.starting",
            EventType::ServiceStarted => "service.started",
            EventType::ServiceStopped => "service.stopped",
            EventType::ServiceFailed => "service.failed",
            EventType::StackUp => "stack.up",
            EventType::StackDown => "stack.down",
            EventType::StackFailed => "stack.failed",
            EventType::VolumeCreated => "volume.created",
            EventType::VolumeRemoved => "volume.removed",
            EventType::NetworkCreated => "network.created",
            EventType::NetworkRemoved => "network.removed",
        }
    }

    /// Get the resource type (e.g., "service", "stack").
    pub fn resource_type(&self) -> &'static str {
        match self {
            EventType::ServiceStarting
            | EventType::ServiceStarted
            | EventType::ServiceStopped
            | EventType::ServiceFailed => "service",
            EventType::StackUp | EventType::StackDown | EventType::StackFailed => "stack",
            EventType::VolumeCreated | EventType::VolumeRemoved => "volume",
            EventType::NetworkCreated | EventType::NetworkRemoved => "network",
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Event type string (e.g., "service.started")
    pub event_type: String,
    /// Resource type (e.g., "service", "stack")
    pub resource_type: String,
    /// Resource ID (service or stack name)
    pub resource_id: String,
    /// Human-readable message
    pub message: String,
}

impl Event {
    /// Create a new event.
    pub fn new(event_type: EventType, resource_id: &str, message: &str) -> Self {
        Self {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
            event_type: event_type.as_str().to_string(),
            resource_type: event_type.resource_type().to_string(),
            resource_id: resource_id.to_string(),
            message: message.to_string(),
        }
    }
}

/// Event bus for publishing and subscribing to lifecycle events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: Event) {
        debug!(event_type = %event.event_type, resource_id = %event.resource_id, "Publishing event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events, optionally filtered by event type patterns.
    ///
    /// # Filter patterns
    ///
    /// - `"service.*"` - All service events
    /// - `"service.started"` - Only service started events
    /// - Empty list - All events
    pub fn subscribe(&self, filters: Vec<String>) -> EventSubscriber {
        EventSubscriber { receiver: self.sender.subscribe(), filters }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event subscriber with optional filtering.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<Event>,
    filters: Vec<String>,
}

impl EventSubscriber {
    /// Receive the next matching event, or None when the bus is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Event subscriber lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return None;
                }
            }
        }
    }

    fn matches(&self, event: &Event) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        self.filters.iter().any(|filter| {
            filter == &event.event_type
                || filter
                    .strip_suffix(".*")
                    .is_some_and(|prefix| event.event_type.starts_with(prefix))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(vec![]);

        bus.publish(Event::new(EventType::ServiceStarted, "db", "service db running"));

        let event = tokio::time::timeout(Duration::from_millis(100), subscriber.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event.event_type, "service.started");
        assert_eq!(event.resource_id, "db");
    }

    #[tokio::test]
    async fn test_filter_match() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(vec!["service.*".to_string()]);

        bus.publish(Event::new(EventType::StackUp, "demo", "stack up"));
        bus.publish(Event::new(EventType::ServiceStarted, "db", "service db running"));

        let event = tokio::time::timeout(Duration::from_millis(100), subscriber.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event.event_type, "service.started");
    }

    #[test]
    fn test_event_type_strings() {
        assert_eq!(EventType::ServiceStarted.as_str(), "service.started");
        assert_eq!(EventType::ServiceStarted.resource_type(), "service");
        assert_eq!(EventType::VolumeRemoved.resource_type(), "volume");
    }
}
