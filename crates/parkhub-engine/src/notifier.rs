//! Change notifier
//!
//! Fire-and-forget fan-out of coarse change events over a tokio broadcast
//! channel. Slow subscribers lag and skip; they never block or fail a
//! mutation. Consumers are expected to re-fetch state on receipt rather
//! than trust event payloads.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

/// A coarse notification that some state changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// One or more slots of a facility changed state
    SlotsChanged { facility_id: Uuid },
    /// One or more bookings of a facility changed state
    BookingsChanged { facility_id: Uuid },
}

/// Broadcast channel for change events
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Create a notifier with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Best effort: an empty
    /// subscriber list is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        match self.sender.send(event.clone()) {
            Ok(n) => trace!(?event, subscribers = n, "change event published"),
            Err(_) => debug!(?event, "change event dropped, no subscribers"),
        }
    }

    /// Subscribe to change events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = ChangeNotifier::new(16);
        let mut rx = notifier.subscribe();
        let facility_id = Uuid::new_v4();

        notifier.publish(ChangeEvent::SlotsChanged { facility_id });

        assert_eq!(
            rx.recv().await.unwrap(),
            ChangeEvent::SlotsChanged { facility_id }
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let notifier = ChangeNotifier::new(16);
        notifier.publish(ChangeEvent::BookingsChanged {
            facility_id: Uuid::new_v4(),
        });
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_but_catches_up() {
        let notifier = ChangeNotifier::new(2);
        let mut rx = notifier.subscribe();
        let facility_id = Uuid::new_v4();

        for _ in 0..5 {
            notifier.publish(ChangeEvent::SlotsChanged { facility_id });
        }

        // The channel overflowed; the receiver reports the lag then resumes
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn test_event_wire_format() {
        let event = ChangeEvent::SlotsChanged {
            facility_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"slots_changed\""));
    }
}
