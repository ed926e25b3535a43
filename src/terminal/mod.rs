//! Staff fulfillment terminal.
//!
//! Holds the live list of active orders for the selected location filter and the staff member's
//! notifications. New orders and notifications raise alerts when they belong to the staff
//! member's own assignment, independently of what the list is currently filtered to.
//!
//! Two feeds keep the state current: change-feed subscriptions and a periodic refresh that
//! catches anything the feed dropped.

pub mod alerts;
pub mod permission;
pub mod sound;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    events::{ChangeEvent, EventBus, Subscription, SubscriptionFilter, Topic},
    location::LocationScope,
    models::{NotificationEntity, OrderEntity},
    session::StaffSession,
    status::OrderStatus,
    store::{NotificationQuery, Store, StoreError},
};
use alerts::{Alert, AlertSink};

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("Ordern {0} finns inte i listan")]
    UnknownOrder(i32),

    #[error("Ordern har okänd status: {0}")]
    UnknownStatus(String),

    #[error("Kan inte ändra status från {from} till {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Bekräfta borttagningen av order {0} först")]
    DeleteNotConfirmed(i32),

    #[error("Åtgärden misslyckades: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TerminalAction {
    Confirm,
    StartPreparing,
    MarkReady,
    MarkDelivered,
    Cancel,
}

impl TerminalAction {
    pub const ALL: [TerminalAction; 5] = [
        TerminalAction::Confirm,
        TerminalAction::StartPreparing,
        TerminalAction::MarkReady,
        TerminalAction::MarkDelivered,
        TerminalAction::Cancel,
    ];

    pub fn target(&self) -> OrderStatus {
        match self {
            TerminalAction::Confirm => OrderStatus::Confirmed,
            TerminalAction::StartPreparing => OrderStatus::Preparing,
            TerminalAction::MarkReady => OrderStatus::Ready,
            TerminalAction::MarkDelivered => OrderStatus::Delivered,
            TerminalAction::Cancel => OrderStatus::Cancelled,
        }
    }

    pub fn label(&self, delivery: bool) -> &'static str {
        match self {
            TerminalAction::Confirm => "Bekräfta",
            TerminalAction::StartPreparing => "Börja tillaga",
            TerminalAction::MarkReady => "Markera som klar",
            TerminalAction::MarkDelivered if delivery => "Markera som levererad",
            TerminalAction::MarkDelivered => "Markera som hämtad",
            TerminalAction::Cancel => "Avbryt",
        }
    }
}

/// Actions offered for an order in `status`. Terminal statuses offer none.
pub fn available_actions(status: OrderStatus) -> Vec<TerminalAction> {
    TerminalAction::ALL
        .into_iter()
        .filter(|action| status.can_transition_to(action.target()))
        .collect()
}

/// Scope the order subscription needs so that both the list filter and alerts are served.
fn order_feed_scope(assigned: LocationScope, filter: LocationScope) -> LocationScope {
    if assigned == filter {
        filter
    } else {
        LocationScope::All
    }
}

fn is_listed(order: &OrderEntity, filter: LocationScope) -> bool {
    filter.matches_code(&order.location) && order.status().is_some_and(|status| status.is_active())
}

fn sort_newest_first(orders: &mut [OrderEntity]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AlertKey {
    Order(i32),
    Notification(i32),
}

/// Asked for before a hard delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    pub order_id: i32,
    pub order_number: i64,
    pub prompt: String,
}

pub struct OrderTerminal {
    store: Arc<dyn Store>,
    sink: Arc<dyn AlertSink>,
    staff: StaffSession,
    filter: LocationScope,
    orders: Vec<OrderEntity>,
    notifications: Vec<NotificationEntity>,
    /// Newest `updated_at` applied per order, from our own writes or the feed.
    versions: HashMap<i32, DateTime<Utc>>,
    alerted: HashSet<AlertKey>,
    pending_delete: Option<i32>,
}

impl OrderTerminal {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn AlertSink>,
        staff: StaffSession,
        filter: LocationScope,
    ) -> Self {
        Self {
            store,
            sink,
            staff,
            filter,
            orders: Vec::new(),
            notifications: Vec::new(),
            versions: HashMap::new(),
            alerted: HashSet::new(),
            pending_delete: None,
        }
    }

    pub fn staff(&self) -> &StaffSession {
        &self.staff
    }

    pub fn filter(&self) -> LocationScope {
        self.filter
    }

    pub fn orders(&self) -> &[OrderEntity] {
        &self.orders
    }

    pub fn order(&self, id: i32) -> Option<&OrderEntity> {
        self.orders.iter().find(|order| order.id == id)
    }

    pub fn notifications(&self) -> &[NotificationEntity] {
        &self.notifications
    }

    pub fn order_subscription(&self) -> SubscriptionFilter {
        SubscriptionFilter::new(
            [Topic::OrdersInsert, Topic::OrdersUpdate, Topic::OrdersDelete],
            order_feed_scope(self.staff.assigned, self.filter),
        )
    }

    pub fn notification_subscription(&self) -> SubscriptionFilter {
        SubscriptionFilter::new([Topic::NotificationsInsert], self.staff.assigned)
    }

    /// Reloads orders and notifications from the store.
    pub async fn refresh(&mut self) -> Result<(), TerminalError> {
        let orders = self.store.list_active_orders(self.filter).await?;
        let notifications = self
            .store
            .list_notifications(NotificationQuery {
                scope: self.staff.assigned,
                unread_only: false,
            })
            .await?;

        debug!(
            orders = orders.len(),
            notifications = notifications.len(),
            filter = %self.filter,
            "Terminal refreshed"
        );

        for order in &orders {
            self.remember_version(order);
        }
        self.orders = orders;
        self.notifications = notifications;
        self.prune();
        Ok(())
    }

    /// Forgets versions and alert keys for rows that are no longer loaded.
    fn prune(&mut self) {
        let orders: HashSet<i32> = self.orders.iter().map(|order| order.id).collect();
        let notified: HashSet<i32> = self
            .notifications
            .iter()
            .filter_map(|notification| notification.order_id())
            .collect();
        let notifications: HashSet<i32> = self.notifications.iter().map(|n| n.id).collect();

        self.versions.retain(|id, _| orders.contains(id));
        self.alerted.retain(|key| match key {
            AlertKey::Order(id) => orders.contains(id) || notified.contains(id),
            AlertKey::Notification(id) => notifications.contains(id),
        });
    }

    /// Changes the list filter and reloads.
    pub async fn set_filter(&mut self, filter: LocationScope) -> Result<(), TerminalError> {
        self.filter = filter;
        self.refresh().await
    }

    /// Replaces the acting staff member. Alerts already raised stay acknowledged.
    pub async fn switch_staff(&mut self, staff: StaffSession) -> Result<(), TerminalError> {
        info!(user_id = %staff.user_id, assigned = %staff.assigned, "Switching terminal staff");
        self.staff = staff;
        self.pending_delete = None;
        self.refresh().await
    }

    /// Applies one change-feed event. Returns the alert raised, if any.
    pub fn apply(&mut self, event: &ChangeEvent) -> Option<Alert> {
        match event {
            ChangeEvent::OrderInserted(order) => {
                if is_listed(order, self.filter) && self.order(order.id).is_none() {
                    self.remember_version(order);
                    self.orders.push(order.clone());
                    sort_newest_first(&mut self.orders);
                }
                if !self.staff.assigned.matches_code(&order.location) {
                    return None;
                }
                self.raise(AlertKey::Order(order.id), || Alert::new_order(order))
            }
            ChangeEvent::OrderUpdated(order) => {
                self.patch(order);
                None
            }
            ChangeEvent::OrderDeleted(order) => {
                self.remove(order.id);
                None
            }
            ChangeEvent::NotificationInserted(notification) => {
                let visible = match self.staff.assigned {
                    LocationScope::All => true,
                    scope => notification
                        .location_code()
                        .is_some_and(|code| scope.matches_code(code)),
                };
                if !visible {
                    return None;
                }
                if !self.notifications.iter().any(|n| n.id == notification.id) {
                    self.notifications.insert(0, notification.clone());
                }

                // The order alert for the same order may already have fired.
                if let Some(order_id) = notification.order_id() {
                    if self.alerted.contains(&AlertKey::Order(order_id)) {
                        self.alerted.insert(AlertKey::Notification(notification.id));
                        return None;
                    }
                    self.alerted.insert(AlertKey::Order(order_id));
                }
                self.raise(AlertKey::Notification(notification.id), || {
                    Alert::notification(notification)
                })
            }
        }
    }

    fn raise(&mut self, key: AlertKey, build: impl FnOnce() -> Alert) -> Option<Alert> {
        if !self.alerted.insert(key) {
            return None;
        }
        let alert = build();
        info!(title = %alert.title, "Raising terminal alert");
        self.sink.raise(&alert);
        Some(alert)
    }

    fn remember_version(&mut self, order: &OrderEntity) {
        let version = self.versions.entry(order.id).or_insert(order.updated_at);
        if order.updated_at > *version {
            *version = order.updated_at;
        }
    }

    /// Applies a row update unless something newer for the same row was already applied.
    fn patch(&mut self, order: &OrderEntity) {
        if let Some(version) = self.versions.get(&order.id) {
            if order.updated_at < *version {
                debug!(order_id = order.id, "Ignoring stale order update");
                return;
            }
        }
        self.remember_version(order);

        let listed = is_listed(order, self.filter);
        match self.orders.iter_mut().find(|row| row.id == order.id) {
            Some(row) if listed => *row = order.clone(),
            Some(_) => self.orders.retain(|row| row.id != order.id),
            None if listed => {
                self.orders.push(order.clone());
                sort_newest_first(&mut self.orders);
            }
            None => {}
        }
    }

    fn remove(&mut self, id: i32) {
        self.orders.retain(|row| row.id != id);
        self.versions.remove(&id);
        if self.pending_delete == Some(id) {
            self.pending_delete = None;
        }
    }

    /// Writes a new status and patches the list right away without waiting for the feed echo.
    ///
    /// On a failed write the list is reloaded so it does not drift from the store.
    pub async fn update_order_status(
        &mut self,
        id: i32,
        status: OrderStatus,
    ) -> Result<OrderEntity, TerminalError> {
        let current = self.order(id).ok_or(TerminalError::UnknownOrder(id))?;
        let from = current
            .status()
            .ok_or_else(|| TerminalError::UnknownStatus(current.status.clone()))?;
        if !from.can_transition_to(status) {
            return Err(TerminalError::InvalidTransition { from, to: status });
        }

        match self.store.update_order_status(id, status, Utc::now()).await {
            Ok(updated) => {
                info!(order_id = id, %from, to = %status, "Order status updated");
                self.patch(&updated);
                Ok(updated)
            }
            Err(err) => {
                warn!(order_id = id, to = %status, "Failed to update order status: {}", err);
                if let Err(reload) = self.refresh().await {
                    warn!("Failed to reload terminal after failed update: {}", reload);
                }
                Err(err.into())
            }
        }
    }

    pub async fn perform(
        &mut self,
        id: i32,
        action: TerminalAction,
    ) -> Result<OrderEntity, TerminalError> {
        self.update_order_status(id, action.target()).await
    }

    /// First step of a delete. Nothing is written until [`OrderTerminal::confirm_delete`].
    pub fn request_delete(&mut self, id: i32) -> Result<DeleteConfirmation, TerminalError> {
        let order = self.order(id).ok_or(TerminalError::UnknownOrder(id))?;
        let confirmation = DeleteConfirmation {
            order_id: id,
            order_number: order.order_number,
            prompt: format!(
                "Vill du radera order #{}? Det går inte att ångra.",
                order.order_number
            ),
        };
        self.pending_delete = Some(id);
        Ok(confirmation)
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Hard-deletes an order whose deletion was requested.
    pub async fn confirm_delete(&mut self, id: i32) -> Result<OrderEntity, TerminalError> {
        if self.pending_delete != Some(id) {
            return Err(TerminalError::DeleteNotConfirmed(id));
        }
        self.pending_delete = None;
        let deleted = self.store.delete_order(id).await?;
        info!(order_id = id, order_number = deleted.order_number, "Order deleted");
        self.remove(id);
        Ok(deleted)
    }

    pub async fn mark_notification_read(&mut self, id: i32) -> Result<(), TerminalError> {
        let updated = self.store.mark_notification_read(id).await?;
        if let Some(row) = self.notifications.iter_mut().find(|n| n.id == id) {
            *row = updated;
        }
        Ok(())
    }

    /// Drives the terminal until `shutdown` is cancelled.
    ///
    /// Subscribes before the first refresh so nothing written in between is missed. A closed
    /// feed leaves the poll as the only source of updates.
    pub async fn run(&mut self, bus: &EventBus, poll: Duration, shutdown: CancellationToken) {
        let mut orders = Some(bus.subscribe(self.order_subscription()));
        let mut notifications = Some(bus.subscribe(self.notification_subscription()));
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(filter = %self.filter, assigned = %self.staff.assigned, "Terminal started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Terminal received shutdown signal");
                    return;
                }
                event = next_event(&mut orders), if orders.is_some() => match event {
                    Some(event) => {
                        self.apply(&event);
                    }
                    None => {
                        warn!("Order feed closed, falling back to polling");
                        orders = None;
                    }
                },
                event = next_event(&mut notifications), if notifications.is_some() => match event {
                    Some(event) => {
                        self.apply(&event);
                    }
                    None => {
                        warn!("Notification feed closed, falling back to polling");
                        notifications = None;
                    }
                },
                _ = ticker.tick() => {
                    if let Err(err) = self.refresh().await {
                        warn!("Terminal refresh failed: {}", err);
                    }
                }
            }
        }
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<Arc<ChangeEvent>> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        core::config::TerminalConfig,
        fixtures::{new_order, order_fixture},
        location::Location,
        store::{FeedStore, MemoryStore, memory::FailPoint},
    };
    use alerts::ChannelSink;

    fn staff(assigned: LocationScope) -> StaffSession {
        StaffSession::new(Uuid::from_u128(9), assigned)
    }

    fn terminal(
        store: Arc<dyn Store>,
        assigned: LocationScope,
        filter: LocationScope,
    ) -> (OrderTerminal, tokio::sync::mpsc::UnboundedReceiver<Alert>) {
        let (sink, rx) = ChannelSink::new();
        (
            OrderTerminal::new(store, Arc::new(sink), staff(assigned), filter),
            rx,
        )
    }

    fn order_at(id: i32, location: &str) -> OrderEntity {
        OrderEntity {
            id,
            order_number: 1000 + id as i64,
            location: location.into(),
            ..order_fixture()
        }
    }

    #[test]
    fn terminal_statuses_offer_no_actions() {
        assert!(available_actions(OrderStatus::Delivered).is_empty());
        assert!(available_actions(OrderStatus::Cancelled).is_empty());
        assert_eq!(available_actions(OrderStatus::Pending).len(), 5);
        assert_eq!(
            available_actions(OrderStatus::Ready),
            vec![TerminalAction::MarkDelivered, TerminalAction::Cancel]
        );
    }

    #[test]
    fn insert_alerts_only_the_assigned_location() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (mut malmo_all, mut malmo_rx) =
            terminal(store.clone(), Location::Malmo.into(), LocationScope::All);
        let (mut malmo_only, _) =
            terminal(store.clone(), Location::Malmo.into(), Location::Malmo.into());
        let (mut trelleborg, mut trelleborg_rx) =
            terminal(store, Location::Trelleborg.into(), LocationScope::All);

        let event = ChangeEvent::OrderInserted(order_at(1, "malmo"));
        assert!(malmo_all.apply(&event).is_some());
        assert!(malmo_only.apply(&event).is_some());
        assert!(trelleborg.apply(&event).is_none());

        assert_eq!(malmo_all.orders().len(), 1);
        assert_eq!(malmo_only.orders().len(), 1);
        // listed because its filter is "all", but no alert
        assert_eq!(trelleborg.orders().len(), 1);
        assert!(malmo_rx.try_recv().is_ok());
        assert!(trelleborg_rx.try_recv().is_err());
    }

    #[test]
    fn list_follows_filter_and_alerts_follow_assignment() {
        let (mut terminal, _) = terminal(
            Arc::new(MemoryStore::new()),
            Location::Malmo.into(),
            Location::Ystad.into(),
        );
        assert_eq!(terminal.order_subscription().scope, LocationScope::All);
        assert!(terminal.apply(&ChangeEvent::OrderInserted(order_at(1, "malmo"))).is_some());
        assert!(terminal.orders().is_empty());
    }

    #[test]
    fn duplicate_events_alert_once() {
        let (mut terminal, _) =
            terminal(Arc::new(MemoryStore::new()), LocationScope::All, LocationScope::All);
        let order = order_at(3, "ystad");
        assert!(terminal.apply(&ChangeEvent::OrderInserted(order.clone())).is_some());
        assert!(terminal.apply(&ChangeEvent::OrderInserted(order.clone())).is_none());
        assert_eq!(terminal.orders().len(), 1);

        let notification = crate::models::NotificationEntity {
            id: 10,
            kind: "order".into(),
            title: "Ny beställning #1003".into(),
            message: String::new(),
            user_role: "admin".into(),
            metadata: serde_json::json!({ "location": "ystad", "order_id": 3 }),
            read: false,
            created_at: Utc::now(),
        };
        // same order, already alerted
        assert!(terminal.apply(&ChangeEvent::NotificationInserted(notification)).is_none());
        assert_eq!(terminal.notifications().len(), 1);
    }

    #[test]
    fn updates_never_alert_and_stale_echoes_are_ignored() {
        let (mut terminal, mut rx) =
            terminal(Arc::new(MemoryStore::new()), LocationScope::All, LocationScope::All);
        let order = order_at(4, "malmo");
        terminal.apply(&ChangeEvent::OrderInserted(order.clone()));
        rx.try_recv().unwrap();

        let newer = OrderEntity {
            status: "ready".into(),
            updated_at: order.updated_at + chrono::Duration::seconds(5),
            ..order.clone()
        };
        assert!(terminal.apply(&ChangeEvent::OrderUpdated(newer)).is_none());
        assert_eq!(terminal.order(4).unwrap().status, "ready");

        let stale = OrderEntity {
            status: "confirmed".into(),
            updated_at: order.updated_at + chrono::Duration::seconds(1),
            ..order
        };
        terminal.apply(&ChangeEvent::OrderUpdated(stale));
        assert_eq!(terminal.order(4).unwrap().status, "ready");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_forgets_rows_that_left_the_list() {
        let memory = Arc::new(MemoryStore::new());
        let kept = memory.insert_order(new_order(1, "malmo", 100)).await.unwrap();
        let (mut terminal, _) = terminal(memory.clone(), LocationScope::All, LocationScope::All);
        terminal.apply(&ChangeEvent::OrderInserted(kept.clone()));
        terminal.apply(&ChangeEvent::OrderInserted(order_at(500, "ystad")));
        assert_eq!(terminal.versions.len(), 2);
        assert_eq!(terminal.alerted.len(), 2);

        terminal.refresh().await.unwrap();
        assert_eq!(terminal.versions.keys().copied().collect::<Vec<_>>(), vec![kept.id]);
        assert!(terminal.alerted.contains(&AlertKey::Order(kept.id)));
        assert!(!terminal.alerted.contains(&AlertKey::Order(500)));
    }

    #[tokio::test]
    async fn status_update_is_optimistic_and_reaches_other_terminals() {
        let bus = EventBus::default();
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Store> = Arc::new(FeedStore::new(memory.clone(), bus.clone()));
        let order = memory.insert_order(new_order(1001, "malmo", 218)).await.unwrap();

        let (mut issuing, _) = terminal(store.clone(), Location::Malmo.into(), Location::Malmo.into());
        let (mut other, _) = terminal(store.clone(), LocationScope::All, LocationScope::All);
        let mut other_feed = bus.subscribe(other.order_subscription());
        issuing.refresh().await.unwrap();
        other.refresh().await.unwrap();

        issuing
            .update_order_status(order.id, OrderStatus::Ready)
            .await
            .unwrap();
        assert_eq!(issuing.order(order.id).unwrap().status, "ready");

        let echo = other_feed.recv().await.unwrap();
        other.apply(&echo);
        assert_eq!(other.order(order.id).unwrap().status, "ready");
        assert!(other.order(order.id).unwrap().ready_at.is_some());
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected_before_the_store() {
        let memory = Arc::new(MemoryStore::new());
        let order = memory.insert_order(new_order(1, "malmo", 100)).await.unwrap();
        memory
            .update_order_status(order.id, OrderStatus::Ready, Utc::now())
            .await
            .unwrap();
        let writes = memory.write_count();

        let (mut terminal, _) = terminal(memory.clone(), LocationScope::All, LocationScope::All);
        terminal.refresh().await.unwrap();
        let err = terminal
            .update_order_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminalError::InvalidTransition { .. }));
        assert_eq!(memory.write_count(), writes);
    }

    #[tokio::test]
    async fn failed_update_reloads_from_store() {
        let memory = Arc::new(MemoryStore::new());
        let order = memory.insert_order(new_order(1, "malmo", 100)).await.unwrap();
        let (mut terminal, _) = terminal(memory.clone(), LocationScope::All, LocationScope::All);
        terminal.refresh().await.unwrap();

        // someone else wrote in the meantime
        memory
            .update_order_status(order.id, OrderStatus::Confirmed, Utc::now())
            .await
            .unwrap();
        memory.fail(FailPoint::UpdateOrder);

        let err = terminal.perform(order.id, TerminalAction::MarkReady).await.unwrap_err();
        assert!(matches!(err, TerminalError::Store(_)));
        assert_eq!(terminal.order(order.id).unwrap().status, "confirmed");
    }

    #[tokio::test]
    async fn delete_needs_confirmation() {
        let memory = Arc::new(MemoryStore::new());
        let order = memory.insert_order(new_order(77, "ystad", 100)).await.unwrap();
        let (mut terminal, _) = terminal(memory.clone(), LocationScope::All, LocationScope::All);
        terminal.refresh().await.unwrap();

        assert!(matches!(
            terminal.confirm_delete(order.id).await,
            Err(TerminalError::DeleteNotConfirmed(_))
        ));
        let confirmation = terminal.request_delete(order.id).unwrap();
        assert!(confirmation.prompt.contains("#77"));
        terminal.confirm_delete(order.id).await.unwrap();

        assert!(terminal.orders().is_empty());
        assert!(memory.orders().is_empty());
    }

    #[tokio::test]
    async fn switching_staff_changes_alert_scope() {
        let (mut terminal, _) = terminal(
            Arc::new(MemoryStore::new()),
            Location::Trelleborg.into(),
            LocationScope::All,
        );
        assert!(terminal.apply(&ChangeEvent::OrderInserted(order_at(1, "malmo"))).is_none());

        terminal
            .switch_staff(staff(Location::Malmo.into()))
            .await
            .unwrap();
        assert_eq!(
            terminal.notification_subscription().scope,
            LocationScope::Only(Location::Malmo)
        );
        assert!(terminal.apply(&ChangeEvent::OrderInserted(order_at(2, "malmo"))).is_some());
    }

    #[tokio::test]
    async fn run_loop_applies_feed_until_cancelled() {
        let bus = EventBus::default();
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Store> = Arc::new(FeedStore::new(memory, bus.clone()));
        let (mut terminal, mut alerts) =
            terminal(store.clone(), Location::Malmo.into(), Location::Malmo.into());

        let poll = TerminalConfig::default().poll_interval;
        let shutdown = CancellationToken::new();
        let handle = {
            let bus = bus.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                terminal.run(&bus, poll, shutdown).await;
                terminal
            })
        };

        while bus.subscriber_count() < 2 {
            tokio::task::yield_now().await;
        }
        store.insert_order(new_order(5, "malmo", 150)).await.unwrap();

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.title, "Ny beställning #5");

        shutdown.cancel();
        let terminal = handle.await.unwrap();
        assert_eq!(terminal.orders().len(), 1);
    }
}
