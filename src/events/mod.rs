//! Event bus for session notifications
//!
//! Fire-and-forget broadcast of [`SessionEvent`]s to any number of listeners
//! (the CLI's `watch` command, tests, future front ends).

pub mod types;

pub use types::SessionEvent;

use tokio::sync::broadcast;

/// Ring buffer size of the broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for [`SessionEvent`]s
///
/// Slow subscribers that fall more than [`EVENT_CHANNEL_CAPACITY`] events
/// behind get a `Lagged` error and skip ahead.
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to all current subscribers; dropped when nobody listens
    pub fn publish(&self, event: SessionEvent) {
        tracing::trace!("Event: {}", event.event_name());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionState;

    #[tokio::test]
    async fn test_every_subscriber_sees_events() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(SessionEvent::ReconnectScheduled {
            attempt: 1,
            delay_ms: 5000,
        });

        for rx in [&mut rx1, &mut rx2] {
            let event = rx.recv().await.unwrap();
            assert!(matches!(
                event,
                SessionEvent::ReconnectScheduled { attempt: 1, delay_ms: 5000 }
            ));
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(SessionEvent::StateChanged {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connecting,
            error: None,
        });
    }
}
