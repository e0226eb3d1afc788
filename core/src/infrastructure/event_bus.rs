// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - in-process pub/sub
//
// Fan-out of client events over tokio broadcast channels. The wallet provider
// watcher publishes `accountsChanged` / `chainChanged` through one bus, and the
// wallet connector publishes state snapshots through another so several views
// can observe the same connection.
//
// In-memory only; a receiver that falls behind loses the oldest events.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct EventBus<E> {
    sender: Arc<broadcast::Sender<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<E: Clone + std::fmt::Debug> EventBus<E> {
    /// Create a bus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: E) -> usize {
        debug!("Publishing event: {:?}", event);
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
        receiver_count
    }

    pub fn subscribe(&self) -> EventReceiver<E> {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Plain broadcast receiver, for interfaces that expose tokio types.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone + std::fmt::Debug> Default for EventBus<E> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver<E> {
    receiver: broadcast::Receiver<E>,
}

impl<E: Clone> EventReceiver<E> {
    /// Wait for the next event
    pub async fn recv(&mut self) -> Result<E, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<E, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wallet::ProviderEvent;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus: EventBus<ProviderEvent> = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let delivered = bus.publish(ProviderEvent::ChainChanged("0x14a34".to_string()));
        assert_eq!(delivered, 2);

        assert_eq!(
            first.recv().await.unwrap(),
            ProviderEvent::ChainChanged("0x14a34".to_string())
        );
        assert_eq!(
            second.recv().await.unwrap(),
            ProviderEvent::ChainChanged("0x14a34".to_string())
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus: EventBus<ProviderEvent> = EventBus::default();
        assert_eq!(bus.publish(ProviderEvent::AccountsChanged(vec![])), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let bus: EventBus<ProviderEvent> = EventBus::new(2);
        let mut receiver = bus.subscribe();

        for i in 0..4 {
            bus.publish(ProviderEvent::ChainChanged(format!("0x{i}")));
        }

        assert_eq!(receiver.recv().await.unwrap_err(), EventBusError::Lagged(2));
        assert_eq!(
            receiver.try_recv().unwrap(),
            ProviderEvent::ChainChanged("0x2".to_string())
        );
    }

    #[test]
    fn test_try_recv_empty() {
        let bus: EventBus<ProviderEvent> = EventBus::new(2);
        let mut receiver = bus.subscribe();
        assert_eq!(receiver.try_recv().unwrap_err(), EventBusError::Empty);
    }
}
