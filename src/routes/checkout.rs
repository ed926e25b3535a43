use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    checkout::{CheckoutOutcome, CheckoutRequest},
    core::{app_error::AppError, app_error::StdResponse, app_state::AppState, middleware},
    location::Location,
    session::Session,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/checkout",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(submit_checkout))
            .routes(utoipa_axum::routes!(get_rules))
            .route_layer(axum::middleware::from_fn(middleware::session_extraction)),
    )
}

/// Place an order.
///
/// Pickup orders are written and confirmed. Delivery returns the marketplace URL to continue on.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Checkout"],
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order placed", body = StdResponse<CheckoutOutcome, String>),
        (status = 200, description = "Delivery handed off", body = StdResponse<CheckoutOutcome, String>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Login required for this order total")
    )
)]
async fn submit_checkout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let outcome = state.checkout.submit(&session, body).await?;

    let (status, message) = match &outcome {
        CheckoutOutcome::Placed(_) => (StatusCode::CREATED, "Order placed successfully"),
        CheckoutOutcome::Redirect { .. } => (StatusCode::OK, "Continue on the delivery marketplace"),
    };

    Ok((
        status,
        StdResponse {
            data: Some(outcome),
            message: Some(message),
        },
    )
        .into_response())
}

#[derive(Serialize, ToSchema)]
struct MarketplaceLink {
    location: Location,
    url: String,
}

#[derive(Serialize, ToSchema)]
struct CheckoutRulesRes {
    anonymous_ceiling: i32,
    delivery_minimum: i32,
    pickup_times: Vec<String>,
    delivery_handoff: bool,
    marketplaces: Vec<MarketplaceLink>,
    cart_ttl_minutes: i64,
    signed_in: bool,
}

/// Rules the checkout form applies before submitting.
#[utoipa::path(
    get,
    path = "/rules",
    tags = ["Checkout"],
    responses(
        (status = 200, description = "Get checkout rules successfully", body = StdResponse<CheckoutRulesRes, String>)
    )
)]
async fn get_rules(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let rules = state.checkout.rules();
    let marketplaces = Location::ALL
        .into_iter()
        .filter_map(|location| {
            rules.marketplace_urls.get(&location).map(|url| MarketplaceLink {
                location,
                url: url.clone(),
            })
        })
        .collect();

    Ok(StdResponse {
        data: Some(CheckoutRulesRes {
            anonymous_ceiling: rules.anonymous_ceiling,
            delivery_minimum: rules.delivery_minimum,
            pickup_times: rules.pickup_times.clone(),
            delivery_handoff: rules.delivery_handoff,
            marketplaces,
            cart_ttl_minutes: state.config.cart_ttl_minutes,
            signed_in: session.is_authenticated(),
        }),
        message: Some("Get checkout rules successfully"),
    })
}
