use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, QueryDsl, QueryableByName, SelectableHelper,
    expression_methods::PgJsonbExpressionMethods, sql_types::BigInt,
};
use diesel_async::RunQueryDsl;
use serde_json::json;

use super::{NotificationQuery, Store, StoreError, StoreResult};
use crate::{
    core::{aliases::DieselError, db::DbPool},
    location::LocationScope,
    models::{
        BookingEntity, CreateBookingEntity, CreateNotificationEntity, CreateOrderEntity,
        NotificationEntity, OrderEntity, OrderStatusChangeset,
    },
    schema::{bookings, notifications, orders},
    status::{BookingStatus, OrderStatus},
};

#[derive(QueryableByName)]
struct NextOrderNumber {
    #[diesel(sql_type = BigInt)]
    value: i64,
}

fn not_found_or(err: DieselError, context: &'static str) -> StoreError {
    match err {
        DieselError::NotFound => StoreError::NotFound,
        err => StoreError::Other(anyhow::Error::new(err).context(context)),
    }
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn next_order_number(&self) -> StoreResult<i64> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let next: NextOrderNumber = diesel::sql_query("SELECT next_order_number() AS value")
            .get_result(conn)
            .await
            .context("Failed to allocate order number")?;

        Ok(next.value)
    }

    async fn insert_order(&self, order: CreateOrderEntity) -> StoreResult<OrderEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let order = diesel::insert_into(orders::table)
            .values(order)
            .returning(OrderEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create order")?;

        Ok(order)
    }

    async fn get_order(&self, id: i32) -> StoreResult<OrderEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        orders::table
            .find(id)
            .select(OrderEntity::as_select())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to get order"))
    }

    async fn list_active_orders(&self, scope: LocationScope) -> StoreResult<Vec<OrderEntity>> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let active: Vec<&str> = OrderStatus::ACTIVE.iter().map(|s| s.as_str()).collect();
        let mut query = orders::table
            .filter(orders::status.eq_any(active))
            .select(OrderEntity::as_select())
            .order_by((orders::created_at.desc(), orders::id.desc()))
            .into_boxed();

        if let Some(location) = scope.location() {
            query = query.filter(orders::location.eq(location.code()));
        }

        let orders: Vec<OrderEntity> = query
            .get_results(conn)
            .await
            .context("Failed to get active orders")?;

        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: i32,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<OrderEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::update(orders::table.find(id))
            .set(OrderStatusChangeset::new(status, at))
            .returning(OrderEntity::as_returning())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to update order status"))
    }

    async fn delete_order(&self, id: i32) -> StoreResult<OrderEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::delete(orders::table.find(id))
            .returning(OrderEntity::as_returning())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to delete order"))
    }

    async fn insert_notification(
        &self,
        notification: CreateNotificationEntity,
    ) -> StoreResult<NotificationEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let notification = diesel::insert_into(notifications::table)
            .values(notification)
            .returning(NotificationEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create notification")?;

        Ok(notification)
    }

    async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> StoreResult<Vec<NotificationEntity>> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let mut statement = notifications::table
            .select(NotificationEntity::as_select())
            .order_by((notifications::created_at.desc(), notifications::id.desc()))
            .into_boxed();

        if let Some(location) = query.scope.location() {
            statement = statement
                .filter(notifications::metadata.contains(json!({ "location": location.code() })));
        }
        if query.unread_only {
            statement = statement.filter(notifications::read.eq(false));
        }

        let notifications: Vec<NotificationEntity> = statement
            .get_results(conn)
            .await
            .context("Failed to get notifications")?;

        Ok(notifications)
    }

    async fn get_notification(&self, id: i32) -> StoreResult<NotificationEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        notifications::table
            .find(id)
            .select(NotificationEntity::as_select())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to get notification"))
    }

    async fn mark_notification_read(&self, id: i32) -> StoreResult<NotificationEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::update(notifications::table.find(id))
            .set(notifications::read.eq(true))
            .returning(NotificationEntity::as_returning())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to mark notification as read"))
    }

    async fn insert_booking(&self, booking: CreateBookingEntity) -> StoreResult<BookingEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let booking = diesel::insert_into(bookings::table)
            .values(booking)
            .returning(BookingEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create booking")?;

        Ok(booking)
    }

    async fn list_bookings(&self, scope: LocationScope) -> StoreResult<Vec<BookingEntity>> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let mut query = bookings::table
            .select(BookingEntity::as_select())
            .order_by((bookings::date.asc(), bookings::time.asc()))
            .into_boxed();

        if let Some(location) = scope.location() {
            query = query.filter(bookings::location.eq(location.code()));
        }

        let bookings: Vec<BookingEntity> = query
            .get_results(conn)
            .await
            .context("Failed to get bookings")?;

        Ok(bookings)
    }

    async fn update_booking_status(
        &self,
        id: i32,
        status: BookingStatus,
    ) -> StoreResult<BookingEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::update(bookings::table.find(id))
            .set((
                bookings::status.eq(status.as_str()),
                bookings::updated_at.eq(Utc::now()),
            ))
            .returning(BookingEntity::as_returning())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to update booking status"))
    }

    async fn delete_booking(&self, id: i32) -> StoreResult<BookingEntity> {
        let conn = &mut self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        diesel::delete(bookings::table.find(id))
            .returning(BookingEntity::as_returning())
            .get_result(conn)
            .await
            .map_err(|err| not_found_or(err, "Failed to delete booking"))
    }
}
