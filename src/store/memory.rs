use std::{collections::HashSet, sync::Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{NotificationQuery, Store, StoreError, StoreResult};
use crate::{
    location::LocationScope,
    models::{
        BookingEntity, CreateBookingEntity, CreateNotificationEntity, CreateOrderEntity,
        NotificationEntity, OrderEntity, OrderStatusChangeset,
    },
    order_number::next_after,
    status::{BookingStatus, OrderStatus},
};

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    NextOrderNumber,
    InsertOrder,
    UpdateOrder,
    InsertNotification,
    ListOrders,
}

#[derive(Default)]
struct Tables {
    orders: Vec<OrderEntity>,
    notifications: Vec<NotificationEntity>,
    bookings: Vec<BookingEntity>,
    order_counter: i64,
    next_id: i32,
}

impl Tables {
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same semantics as the PostgreSQL one.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<FailPoint>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `point` fail until [`MemoryStore::heal`] is called.
    pub fn fail(&self, point: FailPoint) {
        self.lock_failing().insert(point);
    }

    pub fn heal(&self, point: FailPoint) {
        self.lock_failing().remove(&point);
    }

    /// Number of successful writes, across all tables.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn orders(&self) -> Vec<OrderEntity> {
        self.lock().orders.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationEntity> {
        self.lock().notifications.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_failing(&self) -> std::sync::MutexGuard<'_, HashSet<FailPoint>> {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, point: FailPoint) -> StoreResult<()> {
        if self.lock_failing().contains(&point) {
            return Err(StoreError::Other(anyhow!("Injected failure at {:?}", point)));
        }
        Ok(())
    }

    fn record_write(&self) {
        *self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn next_order_number(&self) -> StoreResult<i64> {
        self.check(FailPoint::NextOrderNumber)?;
        let mut tables = self.lock();
        let highest = tables
            .orders
            .iter()
            .map(|order| order.order_number)
            .chain([tables.order_counter])
            .max();
        tables.order_counter = next_after(highest);
        Ok(tables.order_counter)
    }

    async fn insert_order(&self, order: CreateOrderEntity) -> StoreResult<OrderEntity> {
        self.check(FailPoint::InsertOrder)?;
        let mut tables = self.lock();
        if tables
            .orders
            .iter()
            .any(|existing| existing.order_number == order.order_number)
        {
            return Err(StoreError::Other(anyhow!(
                "Order number {} already exists",
                order.order_number
            )));
        }
        let now = Utc::now();
        let id = tables.allocate_id();
        let row = OrderEntity {
            id,
            order_number: order.order_number,
            user_id: order.user_id,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            phone: order.phone,
            items: order.items,
            total_price: order.total_price,
            location: order.location,
            delivery_type: order.delivery_type,
            delivery_address: order.delivery_address,
            pickup_time: order.pickup_time,
            status: order.status,
            special_instructions: order.special_instructions,
            payment_method: order.payment_method,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            preparing_at: None,
            ready_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        tables.orders.push(row.clone());
        drop(tables);
        self.record_write();
        debug!(order_id = id, "Inserted order");
        Ok(row)
    }

    async fn get_order(&self, id: i32) -> StoreResult<OrderEntity> {
        self.lock()
            .orders
            .iter()
            .find(|order| order.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_active_orders(&self, scope: LocationScope) -> StoreResult<Vec<OrderEntity>> {
        self.check(FailPoint::ListOrders)?;
        let mut orders: Vec<OrderEntity> = self
            .lock()
            .orders
            .iter()
            .filter(|order| scope.matches_code(&order.location))
            .filter(|order| order.status().is_some_and(|status| status.is_active()))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: i32,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<OrderEntity> {
        self.check(FailPoint::UpdateOrder)?;
        let mut tables = self.lock();
        let order = tables
            .orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or(StoreError::NotFound)?;
        OrderStatusChangeset::new(status, at).apply_to(order);
        let updated = order.clone();
        drop(tables);
        self.record_write();
        Ok(updated)
    }

    async fn delete_order(&self, id: i32) -> StoreResult<OrderEntity> {
        let mut tables = self.lock();
        let index = tables
            .orders
            .iter()
            .position(|order| order.id == id)
            .ok_or(StoreError::NotFound)?;
        let removed = tables.orders.remove(index);
        drop(tables);
        self.record_write();
        Ok(removed)
    }

    async fn insert_notification(
        &self,
        notification: CreateNotificationEntity,
    ) -> StoreResult<NotificationEntity> {
        self.check(FailPoint::InsertNotification)?;
        let mut tables = self.lock();
        let row = NotificationEntity {
            id: tables.allocate_id(),
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            user_role: notification.user_role,
            metadata: notification.metadata,
            read: false,
            created_at: Utc::now(),
        };
        tables.notifications.push(row.clone());
        drop(tables);
        self.record_write();
        Ok(row)
    }

    async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> StoreResult<Vec<NotificationEntity>> {
        let mut notifications: Vec<NotificationEntity> = self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.visible_to(query.scope))
            .filter(|n| !query.unread_only || !n.read)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn get_notification(&self, id: i32) -> StoreResult<NotificationEntity> {
        self.lock()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn mark_notification_read(&self, id: i32) -> StoreResult<NotificationEntity> {
        let mut tables = self.lock();
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(StoreError::NotFound)?;
        notification.read = true;
        let updated = notification.clone();
        drop(tables);
        self.record_write();
        Ok(updated)
    }

    async fn insert_booking(&self, booking: CreateBookingEntity) -> StoreResult<BookingEntity> {
        let mut tables = self.lock();
        let now = Utc::now();
        let row = BookingEntity {
            id: tables.allocate_id(),
            date: booking.date,
            time: booking.time,
            guests: booking.guests,
            location: booking.location,
            status: booking.status,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            customer_phone: booking.customer_phone,
            message: booking.message,
            notes: booking.notes,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.push(row.clone());
        drop(tables);
        self.record_write();
        Ok(row)
    }

    async fn list_bookings(&self, scope: LocationScope) -> StoreResult<Vec<BookingEntity>> {
        let mut bookings: Vec<BookingEntity> = self
            .lock()
            .bookings
            .iter()
            .filter(|booking| scope.matches_code(&booking.location))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
        Ok(bookings)
    }

    async fn update_booking_status(
        &self,
        id: i32,
        status: BookingStatus,
    ) -> StoreResult<BookingEntity> {
        let mut tables = self.lock();
        let booking = tables
            .bookings
            .iter_mut()
            .find(|booking| booking.id == id)
            .ok_or(StoreError::NotFound)?;
        booking.status = status.as_str().into();
        booking.updated_at = Utc::now();
        let updated = booking.clone();
        drop(tables);
        self.record_write();
        Ok(updated)
    }

    async fn delete_booking(&self, id: i32) -> StoreResult<BookingEntity> {
        let mut tables = self.lock();
        let index = tables
            .bookings
            .iter()
            .position(|booking| booking.id == id)
            .ok_or(StoreError::NotFound)?;
        let removed = tables.bookings.remove(index);
        drop(tables);
        self.record_write();
        Ok(removed)
    }
}
