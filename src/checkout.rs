//! Checkout.
//!
//! Pickup orders are validated, numbered, written as a single order row, and followed by two
//! best-effort side effects: an admin notification row and a confirmation email. Delivery is
//! handed off to an external marketplace after the minimum-order gate, unless in-house delivery
//! is enabled in which case it is written like a pickup order with an address.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    api::email::{Mailer, TemplatedEmail},
    cart::{Cart, CartItem, items_total},
    core::config::default_marketplace_url,
    location::Location,
    models::{CreateNotificationEntity, CreateOrderEntity, DeliveryType, OrderEntity, PaymentMethod},
    order_number,
    session::Session,
    status::OrderStatus,
    store::{Store, StoreError},
};

pub const DEFAULT_ANONYMOUS_CEILING: i32 = 250;
pub const DEFAULT_DELIVERY_MINIMUM: i32 = 150;

/// The single rule set used by every checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRules {
    /// Orders at or above this total need a signed-in customer.
    pub anonymous_ceiling: i32,
    /// Smallest total accepted for delivery.
    pub delivery_minimum: i32,
    pub pickup_times: Vec<String>,
    pub marketplace_urls: HashMap<Location, String>,
    /// Delivery orders are redirected to the marketplace instead of being written.
    pub delivery_handoff: bool,
    pub confirmation_template: String,
}

impl Default for CheckoutRules {
    fn default() -> Self {
        Self {
            anonymous_ceiling: DEFAULT_ANONYMOUS_CEILING,
            delivery_minimum: DEFAULT_DELIVERY_MINIMUM,
            pickup_times: ["asap", "15", "30", "45", "60"]
                .into_iter()
                .map(String::from)
                .collect(),
            marketplace_urls: Location::ALL
                .into_iter()
                .map(|location| (location, default_marketplace_url(location)))
                .collect(),
            delivery_handoff: true,
            confirmation_template: "order_confirmation".into(),
        }
    }
}

impl CheckoutRules {
    /// Amount missing to reach the delivery minimum, if any.
    pub fn delivery_shortfall(&self, total: i32) -> Option<i32> {
        (total < self.delivery_minimum).then(|| self.delivery_minimum - total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub pickup_time: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub location: Location,
    pub delivery_type: DeliveryType,
    pub details: CustomerDetails,
    pub items: Vec<CartItem>,
    /// Total shown to the customer. Rejected when it disagrees with the items.
    #[serde(default)]
    pub total_price: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Varukorgen är tom")]
    EmptyCart,

    #[error("Ogiltig rad i varukorgen: {0}")]
    InvalidItem(String),

    #[error("Fyll i följande fält: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Ogiltig upphämtningstid: {0}")]
    InvalidPickupTime(String),

    #[error("Logga in för att lägga beställningar på {ceiling} kr eller mer (din order: {total} kr)")]
    LoginRequired { total: i32, ceiling: i32 },

    #[error("Lägg till {shortfall} kr till för att beställa leverans (minst {minimum} kr)")]
    BelowDeliveryMinimum { shortfall: i32, minimum: i32 },

    #[error("Beställningen är för stor")]
    TotalTooLarge,

    #[error("Totalsumman stämmer inte: {claimed} kr angavs men varorna kostar {computed} kr")]
    TotalMismatch { claimed: i32, computed: i32 },

    #[error("Leverans är inte tillgänglig för {0}")]
    NoMarketplace(Location),

    #[error("Beställningen kunde inte sparas, försök igen ({0})")]
    Persistence(#[from] StoreError),
}

impl CheckoutError {
    /// Errors raised before any network call.
    pub fn is_validation(&self) -> bool {
        !matches!(self, CheckoutError::Persistence(_))
    }
}

/// What the success view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderConfirmation {
    pub order_id: i32,
    pub order_number: i64,
    pub location: Location,
    pub items: Vec<CartItem>,
    pub total_price: i32,
    pub pickup_time: Option<String>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Placed(OrderConfirmation),
    Redirect { url: String, location: Location },
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Checks the cart lines and returns the recomputed total.
pub fn validate_items(items: &[CartItem]) -> Result<i32, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if let Some(item) = items
        .iter()
        .find(|item| item.quantity < 1 || item.price < 0 || item.extras.iter().any(|e| e.price < 0))
    {
        return Err(CheckoutError::InvalidItem(item.name.clone()));
    }
    if let Some(item) = items.iter().find(|item| item.line_total().is_none()) {
        return Err(CheckoutError::InvalidItem(item.name.clone()));
    }
    items_total(items).ok_or(CheckoutError::TotalTooLarge)
}

/// Required-field check for an order that will be written.
pub fn validate_details(
    rules: &CheckoutRules,
    delivery_type: DeliveryType,
    details: &CustomerDetails,
) -> Result<(), CheckoutError> {
    let mut missing = Vec::new();
    if blank(&details.name) {
        missing.push("namn");
    }
    if blank(&details.phone) {
        missing.push("telefon");
    }
    if blank(&details.email) {
        missing.push("e-post");
    }
    match delivery_type {
        DeliveryType::Pickup if non_empty(details.pickup_time.as_deref()).is_none() => {
            missing.push("upphämtningstid")
        }
        DeliveryType::Delivery if non_empty(details.delivery_address.as_deref()).is_none() => {
            missing.push("leveransadress")
        }
        _ => {}
    }
    if !missing.is_empty() {
        return Err(CheckoutError::MissingFields(missing));
    }

    if delivery_type == DeliveryType::Pickup {
        if let Some(time) = non_empty(details.pickup_time.as_deref()) {
            if !rules.pickup_times.contains(&time) {
                return Err(CheckoutError::InvalidPickupTime(time));
            }
        }
    }
    Ok(())
}

pub struct CheckoutService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    rules: CheckoutRules,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, rules: CheckoutRules) -> Self {
        Self {
            store,
            mailer,
            rules,
        }
    }

    pub fn rules(&self) -> &CheckoutRules {
        &self.rules
    }

    /// Runs every check that happens before the network. Returns the recomputed total.
    pub fn validate(&self, session: &Session, req: &CheckoutRequest) -> Result<i32, CheckoutError> {
        let total = validate_items(&req.items)?;
        match req.total_price {
            Some(claimed) if claimed != total => {
                return Err(CheckoutError::TotalMismatch {
                    claimed,
                    computed: total,
                });
            }
            _ => {}
        }

        if req.delivery_type == DeliveryType::Delivery {
            if let Some(shortfall) = self.rules.delivery_shortfall(total) {
                return Err(CheckoutError::BelowDeliveryMinimum {
                    shortfall,
                    minimum: self.rules.delivery_minimum,
                });
            }
        }

        if self.is_handoff(req.delivery_type) {
            return Ok(total);
        }

        validate_details(&self.rules, req.delivery_type, &req.details)?;

        if !session.is_authenticated() && total >= self.rules.anonymous_ceiling {
            return Err(CheckoutError::LoginRequired {
                total,
                ceiling: self.rules.anonymous_ceiling,
            });
        }
        Ok(total)
    }

    fn is_handoff(&self, delivery_type: DeliveryType) -> bool {
        delivery_type == DeliveryType::Delivery && self.rules.delivery_handoff
    }

    pub async fn submit(
        &self,
        session: &Session,
        req: CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let total = self.validate(session, &req)?;

        if self.is_handoff(req.delivery_type) {
            let url = self
                .rules
                .marketplace_urls
                .get(&req.location)
                .cloned()
                .ok_or(CheckoutError::NoMarketplace(req.location))?;
            info!(location = %req.location, total, "Delivery handed off to marketplace");
            return Ok(CheckoutOutcome::Redirect {
                url,
                location: req.location,
            });
        }

        let order_number = order_number::allocate(self.store.as_ref()).await;
        let details = req.details;
        let is_delivery = req.delivery_type == DeliveryType::Delivery;

        let order = self
            .store
            .insert_order(CreateOrderEntity {
                order_number,
                user_id: session.order_user_id(),
                customer_name: details.name.trim().to_string(),
                customer_email: details.email.trim().to_string(),
                phone: details.phone.trim().to_string(),
                items: serde_json::to_value(&req.items).unwrap_or(Value::Array(Vec::new())),
                total_price: total,
                location: req.location.code().into(),
                delivery_type: req.delivery_type.as_str().into(),
                delivery_address: if is_delivery {
                    non_empty(details.delivery_address.as_deref())
                } else {
                    None
                },
                pickup_time: if is_delivery {
                    None
                } else {
                    non_empty(details.pickup_time.as_deref())
                },
                status: OrderStatus::Pending.as_str().into(),
                special_instructions: non_empty(details.special_instructions.as_deref()),
                payment_method: Some(
                    details
                        .payment_method
                        .unwrap_or(PaymentMethod::OnPickupCard)
                        .as_str()
                        .into(),
                ),
            })
            .await?;

        info!(
            order_id = order.id,
            order_number = order.order_number,
            location = %order.location,
            total = order.total_price,
            "Order placed"
        );

        self.notify_staff(&order).await;
        self.send_confirmation(&order, &req.items);

        Ok(CheckoutOutcome::Placed(OrderConfirmation {
            order_id: order.id,
            order_number: order.order_number,
            location: req.location,
            items: req.items,
            total_price: order.total_price,
            pickup_time: order.pickup_time,
            special_instructions: order.special_instructions,
        }))
    }

    async fn notify_staff(&self, order: &OrderEntity) {
        if let Err(err) = self
            .store
            .insert_notification(CreateNotificationEntity::new_order(order))
            .await
        {
            warn!(order_id = order.id, "Failed to create admin notification: {}", err);
        }
    }

    /// Sent from a spawned task; the checkout response does not wait for it.
    fn send_confirmation(&self, order: &OrderEntity, items: &[CartItem]) {
        let email = confirmation_email(&self.rules.confirmation_template, order, items);
        let mailer = self.mailer.clone();
        let order_id = order.id;
        tokio::spawn(async move {
            if let Err(err) = mailer.send(email).await {
                warn!(order_id, "Failed to send confirmation email: {}", err);
            }
        });
    }
}

pub fn confirmation_email(template: &str, order: &OrderEntity, items: &[CartItem]) -> TemplatedEmail {
    let summary = items
        .iter()
        .map(|item| format!("{}x {}", item.quantity, item.name))
        .collect::<Vec<_>>()
        .join(", ");
    let location = order
        .location()
        .map(|location| location.display_name().to_string())
        .unwrap_or_else(|| order.location.clone());

    let variables = HashMap::from([
        ("customer_name".to_string(), order.customer_name.clone()),
        ("order_number".to_string(), order.order_number.to_string()),
        ("total_price".to_string(), order.total_price.to_string()),
        ("items".to_string(), summary),
        ("location".to_string(), location),
        (
            "pickup_time".to_string(),
            order.pickup_time.clone().unwrap_or_default(),
        ),
        (
            "special_instructions".to_string(),
            order.special_instructions.clone().unwrap_or_default(),
        ),
    ]);

    TemplatedEmail {
        template: template.to_string(),
        to: order.customer_email.clone(),
        variables,
    }
}

/// Steps of the customer-facing checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStep {
    Cart,
    Details,
    PaymentSelect,
    Submitting,
    Success(OrderConfirmation),
    Redirected(String),
}

#[derive(Debug, Clone)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    delivery_type: DeliveryType,
    last_error: Option<String>,
}

impl Default for CheckoutFlow {
    fn default() -> Self {
        Self {
            step: CheckoutStep::Cart,
            delivery_type: DeliveryType::Pickup,
            last_error: None,
        }
    }
}

impl CheckoutFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> &CheckoutStep {
        &self.step
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Leaves the cart view. Delivery below the minimum stays blocked on the cart.
    pub fn begin(
        &mut self,
        cart: &Cart,
        delivery_type: DeliveryType,
        rules: &CheckoutRules,
    ) -> Result<(), CheckoutError> {
        let result = validate_items(cart.items()).and_then(|total| {
            match (delivery_type, rules.delivery_shortfall(total)) {
                (DeliveryType::Delivery, Some(shortfall)) => {
                    Err(CheckoutError::BelowDeliveryMinimum {
                        shortfall,
                        minimum: rules.delivery_minimum,
                    })
                }
                _ => Ok(()),
            }
        });
        if result.is_ok() {
            self.delivery_type = delivery_type;
        }
        self.record(result.map(|_| CheckoutStep::Details))
    }

    /// Accepts the details form. Pickup continues to payment selection.
    pub fn details_entered(
        &mut self,
        details: &CustomerDetails,
        rules: &CheckoutRules,
    ) -> Result<(), CheckoutError> {
        let next = match self.delivery_type {
            DeliveryType::Pickup => CheckoutStep::PaymentSelect,
            DeliveryType::Delivery => CheckoutStep::Details,
        };
        let handoff = self.delivery_type == DeliveryType::Delivery && rules.delivery_handoff;
        let result = if handoff {
            Ok(())
        } else {
            validate_details(rules, self.delivery_type, details)
        };
        self.record(result.map(|_| next))
    }

    /// Submits the order. On failure the flow returns to the details step and the cart is kept.
    pub async fn submit(
        &mut self,
        service: &CheckoutService,
        session: &Session,
        req: CheckoutRequest,
    ) -> Result<&CheckoutStep, CheckoutError> {
        self.step = CheckoutStep::Submitting;
        match service.submit(session, req).await {
            Ok(CheckoutOutcome::Placed(confirmation)) => {
                self.last_error = None;
                self.step = CheckoutStep::Success(confirmation);
                Ok(&self.step)
            }
            Ok(CheckoutOutcome::Redirect { url, .. }) => {
                self.last_error = None;
                self.step = CheckoutStep::Redirected(url);
                Ok(&self.step)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.step = CheckoutStep::Details;
                Err(err)
            }
        }
    }

    /// Closes the success view. Only now is the cart emptied.
    pub fn dismiss(&mut self, cart: &mut Cart) {
        if matches!(self.step, CheckoutStep::Success(_)) {
            cart.clear();
        }
        self.step = CheckoutStep::Cart;
    }

    fn record(&mut self, result: Result<CheckoutStep, CheckoutError>) -> Result<(), CheckoutError> {
        match result {
            Ok(step) => {
                self.last_error = None;
                self.step = step;
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}
