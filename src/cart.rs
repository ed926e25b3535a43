//! Customer cart.
//!
//! Lives entirely on the customer's side: no store round-trip for any operation. Every mutation
//! resets an inactivity timer; once it elapses the cart empties itself. Snapshots are persisted as
//! JSON so a reload within the same profile restores the cart.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

/// Default inactivity window before the cart clears itself.
pub const DEFAULT_CART_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Extra {
    pub name: String,
    pub price: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: String,
    pub name: String,
    /// Whole kronor.
    pub price: i32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
    pub quantity: i32,
    #[serde(default)]
    pub extras: Vec<Extra>,
}

impl CartItem {
    /// Base price plus extras, for a single unit. `None` on overflow.
    pub fn unit_price(&self) -> Option<i32> {
        self.extras
            .iter()
            .try_fold(self.price, |sum, extra| sum.checked_add(extra.price))
    }

    pub fn line_total(&self) -> Option<i32> {
        self.unit_price()?.checked_mul(self.quantity)
    }
}

/// Sum of all line totals, or `None` if any step overflows.
pub fn items_total(items: &[CartItem]) -> Option<i32> {
    items
        .iter()
        .try_fold(0i32, |sum, item| sum.checked_add(item.line_total()?))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    last_activity: DateTime<Utc>,
    ttl_minutes: i64,
}

impl Cart {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_ttl(now, DEFAULT_CART_TTL_MINUTES)
    }

    pub fn with_ttl(now: DateTime<Utc>, ttl_minutes: i64) -> Self {
        Self {
            items: Vec::new(),
            last_activity: now,
            ttl_minutes,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds an item; an existing line with the same id has its quantity increased instead.
    pub fn add(&mut self, item: CartItem, now: DateTime<Utc>) {
        let quantity = item.quantity.max(1);
        match self.items.iter_mut().find(|line| line.id == item.id) {
            Some(line) => line.quantity += quantity,
            None => self.items.push(CartItem { quantity, ..item }),
        }
        self.touch(now);
    }

    /// Sets the quantity of a line. Zero or negative removes it.
    pub fn update_quantity(&mut self, id: &str, quantity: i32, now: DateTime<Utc>) {
        if quantity <= 0 {
            self.remove_item(id, now);
            return;
        }
        if let Some(line) = self.items.iter_mut().find(|line| line.id == id) {
            line.quantity = quantity;
        }
        self.touch(now);
    }

    pub fn set_extras(&mut self, id: &str, extras: Vec<Extra>, now: DateTime<Utc>) {
        if let Some(line) = self.items.iter_mut().find(|line| line.id == id) {
            line.extras = extras;
        }
        self.touch(now);
    }

    pub fn remove_item(&mut self, id: &str, now: DateTime<Utc>) {
        self.items.retain(|line| line.id != id);
        self.touch(now);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_items(&self) -> i32 {
        self.items
            .iter()
            .fold(0i32, |sum, line| sum.saturating_add(line.quantity))
    }

    /// Saturates at `i32::MAX` on overflow.
    pub fn total_price(&self) -> i32 {
        items_total(&self.items).unwrap_or(i32::MAX)
    }

    /// Time left before the cart empties itself, for the countdown shown next to the cart.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let deadline = self.last_activity + Duration::minutes(self.ttl_minutes);
        (deadline - now).max(Duration::zero())
    }

    /// Clears the cart if the inactivity window has elapsed. Returns whether it was cleared.
    pub fn expire_if_idle(&mut self, now: DateTime<Utc>) -> bool {
        if self.items.is_empty() || self.remaining(now) > Duration::zero() {
            return false;
        }
        info!(items = self.items.len(), "Cart expired after inactivity");
        self.clear();
        true
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialize cart")?;
        std::fs::write(path, json).context("Failed to write cart snapshot")?;
        debug!(path = %path.display(), "Cart snapshot saved");
        Ok(())
    }

    /// Restores a snapshot. A missing snapshot yields an empty cart; an expired one is cleared.
    pub fn load(path: &Path, now: DateTime<Utc>) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(now));
        }
        let json = std::fs::read_to_string(path).context("Failed to read cart snapshot")?;
        let mut cart: Cart = serde_json::from_str(&json).context("Failed to parse cart snapshot")?;
        cart.expire_if_idle(now);
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price: i32, quantity: i32) -> CartItem {
        CartItem {
            id: id.into(),
            name: format!("Dish {id}"),
            price,
            image: None,
            category: "mains".into(),
            quantity,
            extras: vec![],
        }
    }

    #[test]
    fn single_line_totals() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 109, 2), now);
        assert_eq!(cart.total_price(), 218);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn extras_count_per_unit() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 100, 3), now);
        cart.set_extras(
            "a",
            vec![
                Extra { name: "Ost".into(), price: 10 },
                Extra { name: "Bacon".into(), price: 15 },
            ],
            now,
        );
        cart.add(item("b", 40, 1), now);
        assert_eq!(cart.total_price(), 3 * 125 + 40);
        assert_eq!(cart.total_items(), 4);
    }

    #[test]
    fn oversized_lines_do_not_wrap() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 1 << 30, 2), now);
        assert_eq!(cart.items()[0].line_total(), None);
        assert_eq!(items_total(cart.items()), None);
        assert_eq!(cart.total_price(), i32::MAX);
    }

    #[test]
    fn adding_same_id_merges_lines() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 50, 1), now);
        cart.add(item("a", 50, 2), now);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn update_quantity_is_idempotent() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 50, 1), now);
        cart.update_quantity("a", 4, now);
        let first = cart.items().to_vec();
        cart.update_quantity("a", 4, now);
        assert_eq!(cart.items(), first.as_slice());
    }

    #[test]
    fn zero_or_negative_quantity_removes_line() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 50, 1), now);
        cart.add(item("b", 60, 1), now);
        cart.update_quantity("a", 0, now);
        cart.update_quantity("b", -3, now);
        assert!(cart.is_empty());
    }

    #[test]
    fn removing_unknown_id_is_noop() {
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 50, 2), now);
        cart.remove_item("missing", now);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn expires_after_inactivity() {
        let start = Utc::now();
        let mut cart = Cart::with_ttl(start, 10);
        cart.add(item("a", 50, 1), start);
        assert_eq!(cart.remaining(start + Duration::minutes(4)), Duration::minutes(6));
        assert!(!cart.expire_if_idle(start + Duration::minutes(9)));

        // activity pushes the deadline forward
        cart.update_quantity("a", 2, start + Duration::minutes(9));
        assert!(!cart.expire_if_idle(start + Duration::minutes(15)));
        assert!(cart.expire_if_idle(start + Duration::minutes(19)));
        assert!(cart.is_empty());
        assert_eq!(cart.remaining(start + Duration::minutes(30)), Duration::zero());
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        let now = Utc::now();
        let mut cart = Cart::new(now);
        cart.add(item("a", 89, 2), now);
        cart.save(&path).unwrap();

        let restored = Cart::load(&path, now + Duration::minutes(1)).unwrap();
        assert_eq!(restored.total_price(), 178);

        let expired = Cart::load(&path, now + Duration::hours(2)).unwrap();
        assert!(expired.is_empty());
    }
}
