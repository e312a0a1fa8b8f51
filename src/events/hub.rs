//! Notification hub
//!
//! A single task owns every subscriber and is driven purely by messages:
//!
//! ```text
//!   subscribe ─┐
//! unsubscribe ─┼──► mpsc<HubCommand> ──► hub task ──► subscriber 1 (mpsc)
//!     publish ─┤                          (owns map) ──► subscriber 2 (mpsc)
//!    shutdown ─┘                                     ──► ...
//! ```
//!
//! Because only the hub task touches the subscriber map, no lock is needed and
//! every subscriber sees events in global publish order.
//!
//! Delivery awaits each subscriber's bounded channel in turn. A subscriber that
//! stops reading without unsubscribing eventually fills its buffer and stalls
//! the hub (and with it the publishers). Dropped receivers are detected on the
//! next send and pruned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{CatalogError, Result};

use super::event::{Event, EventKinds};

/// Identifier of a registered subscriber
pub type SubscriberId = u64;

/// Messages understood by the hub task
enum HubCommand {
    Subscribe {
        id: SubscriberId,
        kinds: EventKinds,
        tx: mpsc::Sender<Event>,
    },
    Unsubscribe(SubscriberId),
    Publish(Event),
    Stats(oneshot::Sender<HubStats>),
    Shutdown,
}

/// Hub counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Events accepted for fan-out
    pub published: u64,
    /// Individual deliveries to subscribers
    pub delivered: u64,
}

struct Subscriber {
    kinds: EventKinds,
    tx: mpsc::Sender<Event>,
}

/// Handle to a running hub
///
/// Cheap to clone; every clone talks to the same task.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    next_subscriber: Arc<AtomicU64>,
    subscriber_buffer: usize,
}

/// A live subscription
///
/// Receives every matching event published after the subscription was
/// registered. `recv` returns `None` once the hub shuts down.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
    hub: Hub,
}

impl Hub {
    /// Spawn the hub task
    ///
    /// `command_capacity` bounds the queue of pending commands and
    /// `subscriber_buffer` the per-subscriber queue of undelivered events.
    pub fn spawn(command_capacity: usize, subscriber_buffer: usize) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(command_capacity.max(1));
        let handle = tokio::spawn(run(rx));

        let hub = Self {
            commands,
            next_subscriber: Arc::new(AtomicU64::new(1)),
            subscriber_buffer: subscriber_buffer.max(1),
        };
        (hub, handle)
    }

    /// Register interest in the given event kinds
    pub async fn subscribe(&self, kinds: EventKinds) -> Result<Subscription> {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);

        self.send(HubCommand::Subscribe { id, kinds, tx }).await?;

        Ok(Subscription {
            id,
            rx,
            hub: self.clone(),
        })
    }

    /// Deregister a subscriber; unknown ids are ignored
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<()> {
        self.send(HubCommand::Unsubscribe(id)).await
    }

    /// Queue an event for fan-out
    pub async fn publish(&self, event: Event) -> Result<()> {
        self.send(HubCommand::Publish(event)).await
    }

    /// Current counters
    pub async fn stats(&self) -> Result<HubStats> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Stats(tx)).await?;
        rx.await.map_err(|_| CatalogError::HubClosed)
    }

    /// Stop the hub task; subscriber streams end
    pub async fn shutdown(&self) {
        // Already stopped is fine
        let _ = self.commands.send(HubCommand::Shutdown).await;
    }

    /// Whether the hub task is gone
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: HubCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CatalogError::HubClosed)
    }
}

impl Subscription {
    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an already delivered event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Deregister and stop receiving
    pub async fn unsubscribe(self) {
        // A stopped hub has already forgotten us
        let _ = self.hub.unsubscribe(self.id).await;
    }
}

async fn run(mut commands: mpsc::Receiver<HubCommand>) {
    let mut subscribers: HashMap<SubscriberId, Subscriber> = HashMap::new();
    let mut stats = HubStats::default();

    tracing::debug!("Notification hub started");

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Subscribe { id, kinds, tx } => {
                subscribers.insert(id, Subscriber { kinds, tx });
                tracing::debug!(
                    subscriber = id,
                    subscribers = subscribers.len(),
                    "Subscriber added"
                );
            }
            HubCommand::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    tracing::debug!(
                        subscriber = id,
                        subscribers = subscribers.len(),
                        "Subscriber removed"
                    );
                }
            }
            HubCommand::Publish(event) => {
                stats.published += 1;

                let mut gone = Vec::new();
                for (id, subscriber) in &subscribers {
                    if !subscriber.kinds.includes(event.kind) {
                        continue;
                    }
                    if subscriber.tx.send(event.clone()).await.is_ok() {
                        stats.delivered += 1;
                    } else {
                        gone.push(*id);
                    }
                }

                for id in gone {
                    subscribers.remove(&id);
                    tracing::debug!(subscriber = id, "Pruned subscriber with dropped receiver");
                }
            }
            HubCommand::Stats(reply) => {
                stats.subscribers = subscribers.len();
                let _ = reply.send(stats.clone());
            }
            HubCommand::Shutdown => break,
        }
    }

    tracing::debug!(
        subscribers = subscribers.len(),
        published = stats.published,
        "Notification hub stopped"
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::events::EventKind;

    fn event(id: u64, kind: EventKind) -> Event {
        Event {
            id,
            kind,
            data: json!({ "id": format!("e{}", id) }),
        }
    }

    #[tokio::test]
    async fn test_fan_out_respects_interest() {
        let (hub, _task) = Hub::spawn(16, 16);

        let mut all = hub.subscribe(EventKinds::all()).await.unwrap();
        let mut deletes = hub.subscribe(EventKinds::DELETE).await.unwrap();

        hub.publish(event(1, EventKind::Create)).await.unwrap();
        hub.publish(event(2, EventKind::Delete)).await.unwrap();

        assert_eq!(all.recv().await.unwrap().id, 1);
        assert_eq!(all.recv().await.unwrap().id, 2);
        assert_eq!(deletes.recv().await.unwrap().id, 2);

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.delivered, 3);
    }

    #[tokio::test]
    async fn test_in_order_delivery() {
        let (hub, _task) = Hub::spawn(4, 2);
        let mut sub = hub.subscribe(EventKinds::all()).await.unwrap();

        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for id in 1..=50 {
                    hub.publish(event(id, EventKind::Update)).await.unwrap();
                }
            })
        };

        for expected in 1..=50 {
            assert_eq!(sub.recv().await.unwrap().id, expected);
        }
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (hub, _task) = Hub::spawn(16, 16);
        let sub = hub.subscribe(EventKinds::all()).await.unwrap();
        let mut other = hub.subscribe(EventKinds::all()).await.unwrap();

        sub.unsubscribe().await;
        // Unknown ids are fine
        assert_ok!(hub.unsubscribe(9999).await);

        hub.publish(event(1, EventKind::Create)).await.unwrap();
        assert_eq!(other.recv().await.unwrap().id, 1);
        assert_eq!(hub.stats().await.unwrap().subscribers, 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let (hub, _task) = Hub::spawn(16, 16);
        let dropped = hub.subscribe(EventKinds::all()).await.unwrap();
        drop(dropped);

        hub.publish(event(1, EventKind::Create)).await.unwrap();
        assert_eq!(hub.stats().await.unwrap().subscribers, 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams() {
        let (hub, task) = Hub::spawn(16, 16);
        let mut sub = hub.subscribe(EventKinds::all()).await.unwrap();

        hub.shutdown().await;
        task.await.unwrap();

        assert!(sub.recv().await.is_none());
        assert!(hub.is_closed());
        assert_err!(hub.publish(event(1, EventKind::Create)).await);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_blocks_fan_out() {
        let (hub, _task) = Hub::spawn(1, 1);
        let _stalled = hub.subscribe(EventKinds::all()).await.unwrap();

        // One event fits the buffer, the second parks the hub, the third fills
        // the command queue and the fourth cannot be accepted
        hub.publish(event(1, EventKind::Create)).await.unwrap();
        hub.publish(event(2, EventKind::Create)).await.unwrap();
        hub.publish(event(3, EventKind::Create)).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            hub.publish(event(4, EventKind::Create)),
        )
        .await;
        assert!(blocked.is_err());
    }
}
