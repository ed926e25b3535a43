use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bistro_orderservice::{
    api::email::{EmailError, Mailer, TemplatedEmail},
    core::{app_state::AppState, config::Config},
    location::LocationScope,
    models::CreateBookingEntity,
    routes,
    store::{MemoryStore, NotificationQuery, Store},
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const STAFF_ID: &str = "6f1c1d2e-0000-4000-8000-000000000001";
const CUSTOMER_ID: &str = "6f1c1d2e-0000-4000-8000-000000000002";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<TemplatedEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: TemplatedEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(store.clone(), mailer.clone(), Config::default());
        Self {
            router: routes::app(state).unwrap(),
            store,
            mailer,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body, headers)
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body, _) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    /// Places a pickup order as a signed-in customer and returns its id.
    async fn place_order(&self, location: &str) -> i64 {
        let (status, body) = self
            .json(
                customer(Request::post("/checkout"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(pickup_checkout(location, 120, 1).to_string()))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["order_id"].as_i64().unwrap()
    }
}

fn staff(builder: axum::http::request::Builder, location: &str) -> axum::http::request::Builder {
    builder
        .header("x-user-id", STAFF_ID)
        .header("x-user-role", "staff")
        .header("x-user-location", location)
}

fn customer(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder
        .header("x-user-id", CUSTOMER_ID)
        .header("x-user-role", "customer")
        .header("x-user-email", "anna@example.se")
}

fn pickup_checkout(location: &str, price: i32, quantity: i32) -> Value {
    json!({
        "location": location,
        "delivery_type": "pickup",
        "details": {
            "name": "Anna Svensson",
            "phone": "0701234567",
            "email": "anna@example.se",
            "pickup_time": "asap"
        },
        "items": [
            { "id": "burger", "name": "Burgare", "price": price, "quantity": quantity }
        ]
    })
}

fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}

#[tokio::test]
async fn anonymous_pickup_under_ceiling_is_placed() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Request::post("/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(pickup_checkout("malmo", 100, 2)))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["outcome"], "placed");
    assert_eq!(body["data"]["total_price"], 200);

    let orders = app.store.list_active_orders(LocationScope::All).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].user_id.is_nil());

    let notifications = app
        .store
        .list_notifications(NotificationQuery::default())
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    for _ in 0..100 {
        if !app.mailer.sent.lock().unwrap().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(app.mailer.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn anonymous_order_over_ceiling_requires_login() {
    let app = TestApp::new();

    let (status, _) = app
        .json(
            Request::post("/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(pickup_checkout("malmo", 100, 3)))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(
        app.store
            .list_active_orders(LocationScope::All)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn delivery_is_handed_off_without_writing() {
    let app = TestApp::new();
    let request = json!({
        "location": "ystad",
        "delivery_type": "delivery",
        "details": {},
        "items": [{ "id": "pizza", "name": "Pizza", "price": 160, "quantity": 1 }]
    });

    let (status, body) = app
        .json(
            customer(Request::post("/checkout"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(request))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["outcome"], "redirect");
    assert_eq!(body["data"]["location"], "ystad");
    assert!(body["data"]["url"].as_str().unwrap().starts_with("http"));
    assert!(
        app.store
            .list_active_orders(LocationScope::All)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn checkout_rules_reflect_session() {
    let app = TestApp::new();

    let (status, body) = app
        .json(customer(Request::get("/checkout/rules")).body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["anonymous_ceiling"], 250);
    assert_eq!(body["data"]["delivery_minimum"], 150);
    assert_eq!(body["data"]["signed_in"], true);
    assert_eq!(body["data"]["marketplaces"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn staff_routes_require_staff_session() {
    let app = TestApp::new();

    let (status, _) = app
        .json(Request::get("/staff/orders").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(customer(Request::get("/staff/orders")).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_list_defaults_to_assigned_location() {
    let app = TestApp::new();
    app.place_order("malmo").await;
    app.place_order("ystad").await;

    let (status, body) = app
        .json(staff(Request::get("/staff/orders"), "malmo").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["location"], "malmo");

    let (_, body) = app
        .json(
            staff(Request::get("/staff/orders?location=all"), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn status_moves_forward_and_rejects_backwards() {
    let app = TestApp::new();
    let id = app.place_order("malmo").await;

    let (status, body) = app
        .json(
            staff(Request::patch(format!("/staff/orders/{id}/status")), "malmo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({ "status": "ready" })))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "ready");

    let (status, _) = app
        .json(
            staff(Request::patch(format!("/staff/orders/{id}/status")), "malmo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({ "status": "confirmed" })))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn listed_orders_at_other_locations_can_be_handled() {
    let app = TestApp::new();
    let id = app.place_order("ystad").await;

    let (status, body) = app
        .json(
            staff(Request::get(format!("/staff/orders/{id}")), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .json(
            staff(Request::patch(format!("/staff/orders/{id}/status")), "malmo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({ "status": "confirmed" })))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn staff_without_a_valid_location_are_refused() {
    let app = TestApp::new();
    app.place_order("malmo").await;

    let unassigned = Request::get("/staff/orders")
        .header("x-user-id", STAFF_ID)
        .header("x-user-role", "staff")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.json(unassigned).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(staff(Request::get("/staff/orders"), "lund").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            staff(Request::get("/staff/notifications"), "lund")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_needs_confirmation() {
    let app = TestApp::new();
    let id = app.place_order("malmo").await;

    let (status, _) = app
        .json(
            staff(Request::delete(format!("/staff/orders/{id}")), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        app.store.list_active_orders(LocationScope::All).await.unwrap().len(),
        1
    );

    let (status, _) = app
        .json(
            staff(Request::delete(format!("/staff/orders/{id}?confirm=true")), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        app.store
            .list_active_orders(LocationScope::All)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn receipt_downloads_as_text_file() {
    let app = TestApp::new();
    let id = app.place_order("malmo").await;
    let order = app.store.get_order(id as i32).await.unwrap();

    let (status, body, headers) = app
        .send(
            staff(Request::get(format!("/staff/orders/{id}/receipt")), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&format!("kvitto-{}.txt", order.order_number)));
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("Burgare"));
    assert!(text.contains("120"));

    let (_, body, headers) = app
        .send(
            staff(Request::get(format!("/staff/orders/{id}/receipt?format=html")), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(String::from_utf8(body).unwrap().contains("window.print"));
}

#[tokio::test]
async fn notifications_are_scoped_and_marked_read() {
    let app = TestApp::new();
    app.place_order("malmo").await;
    app.place_order("trelleborg").await;

    let (_, body) = app
        .json(
            staff(Request::get("/staff/notifications"), "trelleborg")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    let id = notifications[0]["id"].as_i64().unwrap();

    let (status, _) = app
        .json(
            staff(Request::patch(format!("/staff/notifications/{id}/read")), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .json(
            staff(Request::patch(format!("/staff/notifications/{id}/read")), "trelleborg")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read"], true);

    let (_, body) = app
        .json(
            staff(Request::get("/staff/notifications?unread_only=true"), "trelleborg")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

fn booking(location: &str) -> CreateBookingEntity {
    CreateBookingEntity {
        date: NaiveDate::from_ymd_opt(2026, 11, 6).unwrap(),
        time: "18:30".into(),
        guests: 4,
        location: location.into(),
        status: "pending".into(),
        customer_name: Some("Erik Nilsson".into()),
        customer_email: Some("erik@example.se".into()),
        customer_phone: Some("0709876543".into()),
        message: None,
        notes: None,
    }
}

#[tokio::test]
async fn public_bookings_hide_contact_details() {
    let app = TestApp::new();
    app.store.insert_booking(booking("malmo")).await.unwrap();

    let (status, body) = app
        .json(Request::get("/bookings").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
    assert!(body["bookings"][0]["contact"].is_null());

    let (_, body) = app
        .json(staff(Request::get("/bookings"), "malmo").body(Body::empty()).unwrap())
        .await;
    assert_eq!(body["bookings"][0]["contact"]["name"], "Erik Nilsson");
}

#[tokio::test]
async fn staff_confirm_then_complete_booking() {
    let app = TestApp::new();
    let created = app.store.insert_booking(booking("malmo")).await.unwrap();
    let uri = format!("/staff/bookings/{}/status", created.id);

    for (next, expected) in [
        ("completed", StatusCode::CONFLICT),
        ("confirmed", StatusCode::OK),
        ("completed", StatusCode::OK),
    ] {
        let (status, _) = app
            .json(
                staff(Request::patch(&uri), "malmo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(json_body(json!({ "status": next })))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, expected, "moving to {next}");
    }

    let (status, _) = app
        .json(
            staff(Request::delete(format!("/staff/bookings/{}", created.id)), "ystad")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn alert_sound_is_a_wav_file() {
    let app = TestApp::new();

    let (status, body, headers) = app
        .send(staff(Request::get("/staff/alert.wav"), "all").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(&body[..4], b"RIFF");
    assert_eq!(&body[8..12], b"WAVE");
}

#[tokio::test]
async fn permission_advice_follows_user_agent() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            staff(Request::get("/staff/notifications/permission?state=denied"), "all")
                .header(
                    header::USER_AGENT,
                    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "denied");
    assert_eq!(body["data"]["can_request"], false);
    assert!(!body["data"]["steps"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_feed_topic_is_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .json(
            staff(Request::get("/staff/feed?topics=menu:update"), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feed_streams_inserts_at_the_assigned_location() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            staff(Request::get("/staff/feed?topics=orders:insert"), "malmo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();

    app.place_order("trelleborg").await;
    app.place_order("malmo").await;

    let mut text = String::new();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !text.contains("\n\n") {
            let frame = body.frame().await.unwrap().unwrap();
            if let Ok(data) = frame.into_data() {
                text.push_str(&String::from_utf8_lossy(&data));
            }
        }
    })
    .await
    .unwrap();

    assert!(text.contains("event: orders:insert"), "{text}");
    assert!(text.contains(r#""location":"malmo""#), "{text}");
    assert!(!text.contains("trelleborg"), "{text}");
}
