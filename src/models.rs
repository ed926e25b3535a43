use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    bookings::{ContactDetails, parse_legacy_notes},
    cart::CartItem,
    location::{Location, LocationScope},
    status::{BookingStatus, OrderStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Pickup,
    Delivery,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Pickup => "pickup",
            DeliveryType::Delivery => "delivery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    OnPickupCard,
    OnPickupCash,
    Swish,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::OnPickupCard => "on_pickup_card",
            PaymentMethod::OnPickupCash => "on_pickup_cash",
            PaymentMethod::Swish => "swish",
        }
    }
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub order_number: i64,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub phone: String,
    pub items: Value,
    pub total_price: i32,
    pub location: String,
    pub delivery_type: String,
    pub delivery_address: Option<String>,
    pub pickup_time: Option<String>,
    pub status: String,
    pub special_instructions: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderEntity {
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.parse().ok()
    }

    pub fn location(&self) -> Option<Location> {
        self.location.parse().ok()
    }

    pub fn is_delivery(&self) -> bool {
        self.delivery_type == DeliveryType::Delivery.as_str()
    }

    /// Decodes the serialized cart lines. Malformed rows yield an empty list.
    pub fn line_items(&self) -> Vec<CartItem> {
        match serde_json::from_value(self.items.clone()) {
            Ok(items) => items,
            Err(err) => {
                warn!(order_id = self.id, "Failed to decode order items: {}", err);
                Vec::new()
            }
        }
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub order_number: i64,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub phone: String,
    pub items: Value,
    pub total_price: i32,
    pub location: String,
    pub delivery_type: String,
    pub delivery_address: Option<String>,
    pub pickup_time: Option<String>,
    pub status: String,
    pub special_instructions: Option<String>,
    pub payment_method: Option<String>,
}

/// Status write with the matching per-status timestamp. Unset columns are left untouched.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderStatusChangeset {
    pub status: String,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderStatusChangeset {
    pub fn new(status: OrderStatus, at: DateTime<Utc>) -> Self {
        let stamp = |target: OrderStatus| (status == target).then_some(at);
        Self {
            status: status.as_str().into(),
            updated_at: at,
            confirmed_at: stamp(OrderStatus::Confirmed),
            preparing_at: stamp(OrderStatus::Preparing),
            ready_at: stamp(OrderStatus::Ready),
            delivered_at: stamp(OrderStatus::Delivered),
            cancelled_at: stamp(OrderStatus::Cancelled),
        }
    }

    pub fn apply_to(&self, order: &mut OrderEntity) {
        order.status = self.status.clone();
        order.updated_at = self.updated_at;
        order.confirmed_at = self.confirmed_at.or(order.confirmed_at);
        order.preparing_at = self.preparing_at.or(order.preparing_at);
        order.ready_at = self.ready_at.or(order.ready_at);
        order.delivered_at = self.delivered_at.or(order.delivered_at);
        order.cancelled_at = self.cancelled_at.or(order.cancelled_at);
    }
}

// Notifications

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Order,
    System,
    Booking,
    Promotion,
    Info,
    Warning,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Order => "order",
            NotificationKind::System => "system",
            NotificationKind::Booking => "booking",
            NotificationKind::Promotion => "promotion",
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Success => "success",
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationEntity {
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub user_role: String,
    pub metadata: Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationEntity {
    pub fn location_code(&self) -> Option<&str> {
        self.metadata.get("location").and_then(Value::as_str)
    }

    /// Rows without a location are only visible to the `all` scope.
    pub fn visible_to(&self, scope: LocationScope) -> bool {
        match scope {
            LocationScope::All => true,
            scope => self
                .location_code()
                .is_some_and(|code| scope.matches_code(code)),
        }
    }

    pub fn order_id(&self) -> Option<i32> {
        self.metadata
            .get("order_id")
            .and_then(Value::as_i64)
            .and_then(|id| i32::try_from(id).ok())
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateNotificationEntity {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub user_role: String,
    pub metadata: Value,
}

impl CreateNotificationEntity {
    /// Admin alert raised when a new order is placed.
    pub fn new_order(order: &OrderEntity) -> Self {
        Self {
            kind: NotificationKind::Order.as_str().into(),
            title: format!("Ny beställning #{}", order.order_number),
            message: format!(
                "{} beställde för {} kr ({})",
                order.customer_name, order.total_price, order.delivery_type
            ),
            user_role: "admin".into(),
            metadata: json!({
                "location": order.location,
                "order_id": order.id,
                "order_number": order.order_number,
            }),
        }
    }
}

// Bookings

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingEntity {
    pub id: i32,
    pub date: NaiveDate,
    pub time: String,
    pub guests: i32,
    pub location: String,
    pub status: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub message: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingEntity {
    pub fn status(&self) -> Option<BookingStatus> {
        self.status.parse().ok()
    }

    /// Contact details from the dedicated columns, falling back to the legacy `notes` blob for
    /// rows written before those columns existed.
    pub fn contact(&self) -> ContactDetails {
        let legacy = self
            .notes
            .as_deref()
            .map(parse_legacy_notes)
            .unwrap_or_default();
        ContactDetails {
            name: self.customer_name.clone().or(legacy.name),
            email: self.customer_email.clone().or(legacy.email),
            phone: self.customer_phone.clone().or(legacy.phone),
            message: self.message.clone().or(legacy.message),
        }
    }
}

#[derive(Insertable, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateBookingEntity {
    pub date: NaiveDate,
    pub time: String,
    pub guests: i32,
    pub location: String,
    pub status: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub message: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::order_fixture;

    #[test]
    fn changeset_stamps_only_target_column() {
        let at = Utc::now();
        let changeset = OrderStatusChangeset::new(OrderStatus::Ready, at);
        assert_eq!(changeset.ready_at, Some(at));
        assert!(changeset.confirmed_at.is_none());
        assert!(changeset.cancelled_at.is_none());

        let mut order = order_fixture();
        let earlier = at - chrono::Duration::minutes(5);
        order.confirmed_at = Some(earlier);
        changeset.apply_to(&mut order);
        assert_eq!(order.status, "ready");
        assert_eq!(order.confirmed_at, Some(earlier));
        assert_eq!(order.ready_at, Some(at));
    }

    #[test]
    fn malformed_items_decode_to_empty() {
        let mut order = order_fixture();
        order.items = json!({"not": "a list"});
        assert!(order.line_items().is_empty());
    }

    #[test]
    fn notification_metadata_accessors() {
        let order = order_fixture();
        let notification = CreateNotificationEntity::new_order(&order);
        assert_eq!(notification.metadata["location"], "malmo");
        assert_eq!(notification.metadata["order_id"], 1);
        assert!(notification.title.contains("1001"));
    }
}
