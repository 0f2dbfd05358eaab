//! In-process broadcast of daemon events.

use anyhow::Result;
use tokio::sync::broadcast;

use crate::{
    color::{Color, Zone},
    dim::DimOutcome,
};

/// Events published by services and consumed by the coordinator and any
/// other interested subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The session went idle (`true`) or became active again (`false`).
    IdleChanged(bool),
    /// The stats sampler applied a new colour to a zone.
    ZoneColorChanged { zone: Zone, color: Color },
    /// A dim sequence reached a terminal state.
    DimFinished(DimOutcome),
    SystemShutdown,
}

/// Publish-subscribe channel shared by every service.
///
/// # Example
///
/// ```no_run
/// use kb_light_statsd::event::{Event, EventBus};
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus.publish(Event::IdleChanged(true)).ok();
/// // In async context: subscriber.recv().await
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.sender.send(event)?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
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
    use pretty_assertions::assert_eq;
    use tokio::time::{Duration, sleep};

    #[test]
    fn clones_share_one_channel() {
        let event_bus1 = EventBus::new();
        let event_bus2 = event_bus1.clone();

        let _receiver1 = event_bus1.subscribe();
        let _receiver2 = event_bus2.subscribe();

        assert_eq!(event_bus1.sender.receiver_count(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_in_publication_order() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        event_bus.publish(Event::IdleChanged(true)).unwrap();
        event_bus
            .publish(Event::DimFinished(DimOutcome::PoweredOff))
            .unwrap();
        event_bus.publish(Event::IdleChanged(false)).unwrap();

        assert_eq!(receiver.recv().await.unwrap(), Event::IdleChanged(true));
        assert_eq!(
            receiver.recv().await.unwrap(),
            Event::DimFinished(DimOutcome::PoweredOff)
        );
        assert_eq!(receiver.recv().await.unwrap(), Event::IdleChanged(false));
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let event_bus = EventBus::new();
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        let event = Event::ZoneColorChanged {
            zone: Zone::Left,
            color: Color::Red,
        };
        event_bus.publish(event.clone()).unwrap();

        assert_eq!(receiver1.recv().await.unwrap(), event);
        assert_eq!(receiver2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn publish_without_subscribers_returns_error() {
        let event_bus = EventBus::new();
        assert!(event_bus.publish(Event::SystemShutdown).is_err());
    }

    #[tokio::test]
    async fn works_across_tasks() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();
        let publisher = event_bus.clone();

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            publisher.publish(Event::SystemShutdown).unwrap();
        });

        assert_eq!(receiver.recv().await.unwrap(), Event::SystemShutdown);
        handle.await.unwrap();
    }
}
