use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::permission::PermissionState;
use crate::{
    location::Location,
    models::{NotificationEntity, OrderEntity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NewOrder,
    Notification,
}

/// Something the staff member must notice: dialog, sound and optionally a desktop notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    pub location: Option<Location>,
    pub order_id: Option<i32>,
    /// Desktop notifications with the same tag replace each other.
    pub tag: String,
}

impl Alert {
    pub fn new_order(order: &OrderEntity) -> Self {
        let place = order
            .location()
            .map(|location| location.display_name().to_string())
            .unwrap_or_else(|| order.location.clone());
        Self {
            kind: AlertKind::NewOrder,
            title: format!("Ny beställning #{}", order.order_number),
            body: format!(
                "{} - {} kr ({})",
                order.customer_name, order.total_price, place
            ),
            location: order.location(),
            order_id: Some(order.id),
            tag: format!("order-{}", order.id),
        }
    }

    pub fn notification(notification: &NotificationEntity) -> Self {
        Self {
            kind: AlertKind::Notification,
            title: notification.title.clone(),
            body: notification.message.clone(),
            location: notification
                .location_code()
                .and_then(|code| code.parse().ok()),
            order_id: notification.order_id(),
            tag: format!("notification-{}", notification.id),
        }
    }
}

/// Where raised alerts go.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: &Alert);
}

impl AlertSink for Vec<Arc<dyn AlertSink>> {
    fn raise(&self, alert: &Alert) {
        for sink in self {
            sink.raise(alert);
        }
    }
}

/// Forwards alerts to a channel, e.g. the dialog of a UI loop.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelSink {
    fn raise(&self, alert: &Alert) {
        if self.tx.send(alert.clone()).is_err() {
            debug!(tag = %alert.tag, "Alert receiver gone, dropping alert");
        }
    }
}

/// What is handed to the OS notification API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tag: String,
    /// Order to open when the notification is clicked.
    pub open_order: Option<i32>,
}

/// Desktop notifications, only shown once permission has been granted.
pub struct DesktopSink {
    permission: Mutex<PermissionState>,
    icon: String,
    tx: mpsc::UnboundedSender<DesktopNotification>,
}

impl DesktopSink {
    pub fn new(
        permission: PermissionState,
        icon: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<DesktopNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            permission: Mutex::new(permission),
            icon: icon.into(),
            tx,
        };
        (sink, rx)
    }

    pub fn permission(&self) -> PermissionState {
        *self
            .permission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_permission(&self, state: PermissionState) {
        *self
            .permission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }
}

impl AlertSink for DesktopSink {
    fn raise(&self, alert: &Alert) {
        let permission = self.permission();
        if permission != PermissionState::Granted {
            debug!(?permission, tag = %alert.tag, "Desktop notification skipped");
            return;
        }
        let notification = DesktopNotification {
            title: alert.title.clone(),
            body: alert.body.clone(),
            icon: self.icon.clone(),
            tag: alert.tag.clone(),
            open_order: alert.order_id,
        };
        if self.tx.send(notification).is_err() {
            warn!(tag = %alert.tag, "Desktop notification receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::order_fixture;

    #[test]
    fn new_order_alert_names_the_order() {
        let alert = Alert::new_order(&order_fixture());
        assert_eq!(alert.title, "Ny beställning #1001");
        assert_eq!(alert.location, Some(Location::Malmo));
        assert_eq!(alert.order_id, Some(1));
        assert!(alert.body.contains("Malmö"));
    }

    #[test]
    fn desktop_sink_respects_permission() {
        let (sink, mut rx) = DesktopSink::new(PermissionState::Default, "/icon.png");
        let alert = Alert::new_order(&order_fixture());

        sink.raise(&alert);
        assert!(rx.try_recv().is_err());

        sink.set_permission(PermissionState::Granted);
        sink.raise(&alert);
        let shown = rx.try_recv().unwrap();
        assert_eq!(shown.tag, "order-1");
        assert_eq!(shown.open_order, Some(1));
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let (first, mut first_rx) = ChannelSink::new();
        let (second, mut second_rx) = ChannelSink::new();
        let sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(first), Arc::new(second)];

        sinks.raise(&Alert::new_order(&order_fixture()));
        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_ok());
    }
}
