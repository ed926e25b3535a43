use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    cart::{CartItem, Extra},
    models::{CreateOrderEntity, OrderEntity},
};

pub(crate) fn cart_item(id: &str, price: i32, quantity: i32) -> CartItem {
    CartItem {
        id: id.into(),
        name: format!("Rätt {id}"),
        price,
        image: None,
        category: "mains".into(),
        quantity,
        extras: vec![],
    }
}

pub(crate) fn cart_item_with_extras(id: &str, price: i32, quantity: i32, extras: &[(&str, i32)]) -> CartItem {
    CartItem {
        extras: extras
            .iter()
            .map(|(name, price)| Extra {
                name: (*name).into(),
                price: *price,
            })
            .collect(),
        ..cart_item(id, price, quantity)
    }
}

pub(crate) fn order_fixture() -> OrderEntity {
    let now = Utc::now();
    OrderEntity {
        id: 1,
        order_number: 1001,
        user_id: Uuid::nil(),
        customer_name: "Anna".into(),
        customer_email: "anna@example.se".into(),
        phone: "0701234567".into(),
        items: json!([]),
        total_price: 0,
        location: "malmo".into(),
        delivery_type: "pickup".into(),
        delivery_address: None,
        pickup_time: Some("asap".into()),
        status: "pending".into(),
        special_instructions: None,
        payment_method: None,
        created_at: now,
        updated_at: now,
        confirmed_at: None,
        preparing_at: None,
        ready_at: None,
        delivered_at: None,
        cancelled_at: None,
    }
}

pub(crate) fn new_order(order_number: i64, location: &str, total_price: i32) -> CreateOrderEntity {
    CreateOrderEntity {
        order_number,
        user_id: Uuid::nil(),
        customer_name: "Anna".into(),
        customer_email: "anna@example.se".into(),
        phone: "0701234567".into(),
        items: json!([]),
        total_price,
        location: location.into(),
        delivery_type: "pickup".into(),
        delivery_address: None,
        pickup_time: Some("asap".into()),
        status: "pending".into(),
        special_instructions: None,
        payment_method: None,
    }
}
