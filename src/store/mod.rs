//! Persistence seam.
//!
//! `Store` is the query / insert / update / delete surface the rest of the service talks to.
//! `PgStore` is the production implementation, `MemoryStore` backs tests and local runs without a
//! database, and `FeedStore` wraps either one and publishes every successful write on the
//! change feed.

pub mod memory;
pub mod pg;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    events::{ChangeEvent, EventBus},
    location::LocationScope,
    models::{
        BookingEntity, CreateBookingEntity, CreateNotificationEntity, CreateOrderEntity,
        NotificationEntity, OrderEntity,
    },
    status::{BookingStatus, OrderStatus},
};

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationQuery {
    pub scope: LocationScope,
    pub unread_only: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Allocates the next sequential order number.
    async fn next_order_number(&self) -> StoreResult<i64>;

    async fn insert_order(&self, order: CreateOrderEntity) -> StoreResult<OrderEntity>;

    async fn get_order(&self, id: i32) -> StoreResult<OrderEntity>;

    /// Orders in an active status for the scope, newest first.
    async fn list_active_orders(&self, scope: LocationScope) -> StoreResult<Vec<OrderEntity>>;

    /// Single-row status write stamping the status-specific timestamp column.
    async fn update_order_status(
        &self,
        id: i32,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<OrderEntity>;

    async fn delete_order(&self, id: i32) -> StoreResult<OrderEntity>;

    async fn insert_notification(
        &self,
        notification: CreateNotificationEntity,
    ) -> StoreResult<NotificationEntity>;

    /// Notifications for the scope, newest first.
    async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> StoreResult<Vec<NotificationEntity>>;

    async fn get_notification(&self, id: i32) -> StoreResult<NotificationEntity>;

    async fn mark_notification_read(&self, id: i32) -> StoreResult<NotificationEntity>;

    async fn insert_booking(&self, booking: CreateBookingEntity) -> StoreResult<BookingEntity>;

    /// Bookings for the scope ordered by date and time.
    async fn list_bookings(&self, scope: LocationScope) -> StoreResult<Vec<BookingEntity>>;

    async fn update_booking_status(
        &self,
        id: i32,
        status: BookingStatus,
    ) -> StoreResult<BookingEntity>;

    async fn delete_booking(&self, id: i32) -> StoreResult<BookingEntity>;
}

/// Publishes a change event after each successful order or notification write.
pub struct FeedStore {
    inner: Arc<dyn Store>,
    bus: EventBus,
}

impl FeedStore {
    pub fn new(inner: Arc<dyn Store>, bus: EventBus) -> Self {
        Self { inner, bus }
    }
}

#[async_trait]
impl Store for FeedStore {
    async fn next_order_number(&self) -> StoreResult<i64> {
        self.inner.next_order_number().await
    }

    async fn insert_order(&self, order: CreateOrderEntity) -> StoreResult<OrderEntity> {
        let order = self.inner.insert_order(order).await?;
        self.bus.publish(ChangeEvent::OrderInserted(order.clone()));
        Ok(order)
    }

    async fn get_order(&self, id: i32) -> StoreResult<OrderEntity> {
        self.inner.get_order(id).await
    }

    async fn list_active_orders(&self, scope: LocationScope) -> StoreResult<Vec<OrderEntity>> {
        self.inner.list_active_orders(scope).await
    }

    async fn update_order_status(
        &self,
        id: i32,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<OrderEntity> {
        let order = self.inner.update_order_status(id, status, at).await?;
        self.bus.publish(ChangeEvent::OrderUpdated(order.clone()));
        Ok(order)
    }

    async fn delete_order(&self, id: i32) -> StoreResult<OrderEntity> {
        let order = self.inner.delete_order(id).await?;
        self.bus.publish(ChangeEvent::OrderDeleted(order.clone()));
        Ok(order)
    }

    async fn insert_notification(
        &self,
        notification: CreateNotificationEntity,
    ) -> StoreResult<NotificationEntity> {
        let notification = self.inner.insert_notification(notification).await?;
        self.bus
            .publish(ChangeEvent::NotificationInserted(notification.clone()));
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> StoreResult<Vec<NotificationEntity>> {
        self.inner.list_notifications(query).await
    }

    async fn get_notification(&self, id: i32) -> StoreResult<NotificationEntity> {
        self.inner.get_notification(id).await
    }

    async fn mark_notification_read(&self, id: i32) -> StoreResult<NotificationEntity> {
        self.inner.mark_notification_read(id).await
    }

    async fn insert_booking(&self, booking: CreateBookingEntity) -> StoreResult<BookingEntity> {
        self.inner.insert_booking(booking).await
    }

    async fn list_bookings(&self, scope: LocationScope) -> StoreResult<Vec<BookingEntity>> {
        self.inner.list_bookings(scope).await
    }

    async fn update_booking_status(
        &self,
        id: i32,
        status: BookingStatus,
    ) -> StoreResult<BookingEntity> {
        self.inner.update_booking_status(id, status).await
    }

    async fn delete_booking(&self, id: i32) -> StoreResult<BookingEntity> {
        self.inner.delete_booking(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{SubscriptionFilter, Topic},
        fixtures::new_order,
    };

    #[tokio::test]
    async fn successful_writes_are_published() {
        let bus = EventBus::default();
        let mut subscription = bus.subscribe(SubscriptionFilter::everything());
        let store = FeedStore::new(Arc::new(MemoryStore::new()), bus.clone());

        let order = store.insert_order(new_order(1, "malmo", 100)).await.unwrap();
        store
            .update_order_status(order.id, OrderStatus::Confirmed, Utc::now())
            .await
            .unwrap();

        assert_eq!(subscription.recv().await.unwrap().topic(), Topic::OrdersInsert);
        assert_eq!(subscription.recv().await.unwrap().topic(), Topic::OrdersUpdate);
    }

    #[tokio::test]
    async fn failed_writes_publish_nothing() {
        let bus = EventBus::default();
        let mut subscription = bus.subscribe(SubscriptionFilter::everything());
        let store = FeedStore::new(Arc::new(MemoryStore::new()), bus.clone());

        let result = store
            .update_order_status(404, OrderStatus::Ready, Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));

        drop(store);
        drop(bus);
        assert!(subscription.recv().await.is_none());
    }
}
