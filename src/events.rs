//! Change feed.
//!
//! A single shared bus carrying typed topics. Every subscriber gets its own predicate (topic set
//! plus location scope) instead of its own channel.
//!
//! ```text
//! FeedStore (write ok) ──► EventBus (broadcast)
//!                              ├──► Subscription [orders:insert, orders:update | malmo]
//!                              ├──► Subscription [notifications:insert | all]
//!                              └──► /staff/feed (SSE)
//! ```

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    location::LocationScope,
    models::{NotificationEntity, OrderEntity},
};

pub const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "orders:insert")]
    OrdersInsert,
    #[serde(rename = "orders:update")]
    OrdersUpdate,
    #[serde(rename = "orders:delete")]
    OrdersDelete,
    #[serde(rename = "notifications:insert")]
    NotificationsInsert,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::OrdersInsert,
        Topic::OrdersUpdate,
        Topic::OrdersDelete,
        Topic::NotificationsInsert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::OrdersInsert => "orders:insert",
            Topic::OrdersUpdate => "orders:update",
            Topic::OrdersDelete => "orders:delete",
            Topic::NotificationsInsert => "notifications:insert",
        }
    }

    pub fn is_order(&self) -> bool {
        !matches!(self, Topic::NotificationsInsert)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown topic: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "row")]
pub enum ChangeEvent {
    #[serde(rename = "orders:insert")]
    OrderInserted(OrderEntity),
    #[serde(rename = "orders:update")]
    OrderUpdated(OrderEntity),
    #[serde(rename = "orders:delete")]
    OrderDeleted(OrderEntity),
    #[serde(rename = "notifications:insert")]
    NotificationInserted(NotificationEntity),
}

impl ChangeEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ChangeEvent::OrderInserted(_) => Topic::OrdersInsert,
            ChangeEvent::OrderUpdated(_) => Topic::OrdersUpdate,
            ChangeEvent::OrderDeleted(_) => Topic::OrdersDelete,
            ChangeEvent::NotificationInserted(_) => Topic::NotificationsInsert,
        }
    }

    /// Location code carried by the row, if any.
    pub fn location_code(&self) -> Option<&str> {
        match self {
            ChangeEvent::OrderInserted(order)
            | ChangeEvent::OrderUpdated(order)
            | ChangeEvent::OrderDeleted(order) => Some(order.location.as_str()),
            ChangeEvent::NotificationInserted(notification) => notification.location_code(),
        }
    }
}

/// Which events a subscriber wants to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub topics: Vec<Topic>,
    pub scope: LocationScope,
}

impl SubscriptionFilter {
    pub fn new(topics: impl IntoIterator<Item = Topic>, scope: LocationScope) -> Self {
        Self {
            topics: topics.into_iter().collect(),
            scope,
        }
    }

    pub fn everything() -> Self {
        Self::new(Topic::ALL, LocationScope::All)
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.topics.contains(&event.topic()) {
            return false;
        }
        match (self.scope, event.location_code()) {
            (LocationScope::All, _) => true,
            (scope, Some(code)) => scope.matches_code(code),
            // Rows without a location are only visible to unfiltered subscribers.
            (LocationScope::Only(_), None) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<ChangeEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes to every live subscriber. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let topic = event.topic();
        match self.tx.send(Arc::new(event)) {
            Ok(receivers) => debug!(%topic, receivers, "Published change event"),
            Err(_) => debug!(%topic, "Published change event with no subscribers"),
        }
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A filtered view of the bus. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<Arc<ChangeEvent>>,
    filter: SubscriptionFilter,
}

impl Subscription {
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Next matching event, or `None` once the bus is gone.
    ///
    /// A lagging subscriber skips the overwritten events; callers rely on their periodic
    /// refresh to catch up.
    pub async fn recv(&mut self) -> Option<Arc<ChangeEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change feed subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
