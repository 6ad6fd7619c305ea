use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::{DashboardEvent, EventEnvelope, EventMetadata};

const DEFAULT_CAPACITY: usize = 256;

/// Typed publish/subscribe hub shared by every dashboard component.
///
/// Publishing never blocks: with no subscribers the event is dropped, and a
/// subscriber that falls behind skips the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, source: &str, event: DashboardEvent) -> usize {
        let name = event.name();
        let envelope = EventEnvelope {
            metadata: EventMetadata::new(source),
            event,
        };
        match self.sender.send(envelope) {
            Ok(receivers) => {
                tracing::trace!(event = name, source, receivers, "event published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventSubscriber {
    /// Next event, skipping over lag gaps. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking drain of everything currently queued.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => events.push(envelope),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events_in_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish("test", DashboardEvent::DataUpdated), 2);
        assert_eq!(
            bus.publish("test", DashboardEvent::EmergencyMode { enabled: true }),
            2
        );

        let received = first.recv().await.expect("event");
        assert_eq!(received.event, DashboardEvent::DataUpdated);
        assert_eq!(received.metadata.source, "test");
        let names: Vec<_> = second.drain().iter().map(|e| e.event.name()).collect();
        assert_eq!(names, vec!["data-updated", "emergency-mode"]);
    }

    #[test]
    fn publishing_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish("test", DashboardEvent::DataUpdated), 0);
    }

    #[test]
    fn envelope_serializes_with_kebab_kind() {
        let envelope = EventEnvelope {
            metadata: EventMetadata::new("tabs"),
            event: DashboardEvent::TabChanged {
                tab_id: "map".into(),
                tab_name: "Risk Map".into(),
            },
        };
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json()).unwrap();
        assert_eq!(value["event"]["kind"], "tab-changed");
        assert_eq!(value["event"]["detail"]["tab_id"], "map");
    }
}
