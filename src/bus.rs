//! Change notifier - in-process publish/subscribe for buffer mutations.
//!
//! Observers (a view-state synchronization layer, loggers) subscribe to learn
//! about channel writes without polling the buffer. Publishing is
//! fire-and-forget: an event with no subscribers is simply dropped, and a
//! lagging subscriber misses events rather than backpressuring the
//! dispatcher.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffer capacity for the broadcast channel. Slow subscribers that fall more
/// than this many events behind see a `Lagged` error and resync from
/// `Dispatcher::buffer()`.
const BUS_CAPACITY: usize = 256;

/// Events announcing buffer mutations.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// One channel was written (`set_channel`).
    ChannelChanged { channel: u16, value: u8 },

    /// The whole buffer was replaced, e.g. after a blackout. Carries the full
    /// 512-value snapshot.
    BufferChanged { buffer: Vec<u8> },
}

impl BusEvent {
    /// Stable event name for logging and wire serialization.
    pub fn event_type(&self) -> &'static str {
        match self {
            BusEvent::ChannelChanged { .. } => "channel_changed",
            BusEvent::BufferChanged { .. } => "buffer_changed",
        }
    }
}

/// Shared handle to the event bus.
pub type SharedBus = Arc<Bus>;

pub struct Bus {
    tx: broadcast::Sender<BusEvent>,
}

impl Bus {
    /// Publish an event to all current subscribers. No subscribers is fine.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

/// Create a new shared bus.
pub fn create_bus() -> SharedBus {
    let (tx, _) = broadcast::channel(BUS_CAPACITY);
    Arc::new(Bus { tx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = create_bus();
        let mut rx = bus.subscribe();

        bus.publish(BusEvent::ChannelChanged {
            channel: 12,
            value: 128,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            BusEvent::ChannelChanged {
                channel: 12,
                value: 128
            }
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = create_bus();
        // Must not panic or error.
        bus.publish(BusEvent::BufferChanged { buffer: vec![0; 512] });
    }

    #[test]
    fn test_event_type_names() {
        let event = BusEvent::ChannelChanged {
            channel: 1,
            value: 0,
        };
        assert_eq!(event.event_type(), "channel_changed");

        let event = BusEvent::BufferChanged { buffer: Vec::new() };
        assert_eq!(event.event_type(), "buffer_changed");
    }
}
