use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use super::assigned_scope;
use crate::{
    cart::CartItem,
    core::{app_error::AppError, app_error::StdResponse, app_state::AppState},
    location::LocationScope,
    models::OrderEntity,
    receipt::{ReceiptFormat, ReceiptLayout, generate_receipt},
    session::Session,
    status::OrderStatus,
    terminal::{TerminalAction, available_actions},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order, delete_order))
            .routes(utoipa_axum::routes!(update_order_status))
            .routes(utoipa_axum::routes!(get_receipt)),
    )
}

#[derive(Deserialize, IntoParams)]
struct ListOrdersQuery {
    /// `all` or a location code. Defaults to the staff member's own assignment.
    #[param(value_type = Option<String>)]
    location: Option<LocationScope>,
}

/// Fetch active orders, newest first.
///
/// The location filter is independent of the staff member's assignment, like the terminal's list
/// filter, and every listed order can be opened and acted on. The assignment only scopes
/// notifications and alerts.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Staff orders"],
    security(("bearerAuth" = [])),
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "List active orders", body = StdResponse<Vec<OrderEntity>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let scope = match query.location {
        Some(scope) => scope,
        None => assigned_scope(&session)?,
    };
    let orders = state.store.list_active_orders(scope).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get active orders successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    order: OrderEntity,
    items: Vec<CartItem>,
    actions: Vec<TerminalAction>,
}

/// Fetch a specific order with the actions currently available for it.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Staff orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.store.get_order(id).await?;

    let actions = order.status().map(available_actions).unwrap_or_default();
    Ok(StdResponse {
        data: Some(GetOrderRes {
            items: order.line_items(),
            order,
            actions,
        }),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateStatusReq {
    status: OrderStatus,
}

/// Move an order to a new status.
///
/// Only forward transitions and cancellation of a non-final order are accepted.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Staff orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Order status updated", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Transition not allowed")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<UpdateStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.store.get_order(id).await?;

    let current = order
        .status()
        .ok_or_else(|| AppError::Conflict(format!("Ordern har okänd status: {}", order.status)))?;
    if !current.can_transition_to(body.status) {
        return Err(AppError::Conflict(format!(
            "Kan inte ändra status från {} till {}",
            current, body.status
        )));
    }

    let updated = state
        .store
        .update_order_status(id, body.status, Utc::now())
        .await?;
    info!(
        order_id = id,
        staff_id = ?session.user().map(|user| user.user_id),
        from = %current,
        to = %body.status,
        "Order status updated"
    );

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Update order status successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct DeleteOrderQuery {
    /// Must be `true`; the first call without it only returns the confirmation prompt.
    #[serde(default)]
    confirm: bool,
}

/// Permanently delete an order.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Staff orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to delete"),
        DeleteOrderQuery
    ),
    responses(
        (status = 200, description = "Order deleted", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Deletion not confirmed")
    )
)]
async fn delete_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<DeleteOrderQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.store.get_order(id).await?;

    if !query.confirm {
        return Err(AppError::Conflict(format!(
            "Vill du radera order #{}? Det går inte att ångra. Bekräfta med confirm=true.",
            order.order_number
        )));
    }

    let deleted = state.store.delete_order(id).await?;
    info!(
        order_id = id,
        order_number = deleted.order_number,
        staff_id = ?session.user().map(|user| user.user_id),
        "Order deleted"
    );

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Delete order successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct ReceiptQuery {
    #[serde(default)]
    #[param(value_type = Option<String>)]
    format: ReceiptFormat,
}

/// Receipt for an order, as a text file download or a page that opens the print dialog.
#[utoipa::path(
    get,
    path = "/{id}/receipt",
    tags = ["Staff orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID"),
        ReceiptQuery
    ),
    responses(
        (status = 200, description = "Receipt document, text/plain or text/html", body = String, content_type = "text/plain")
    )
)]
async fn get_receipt(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> Result<Response, AppError> {
    let order = state.store.get_order(id).await?;

    let receipt = generate_receipt(&order, ReceiptLayout::default());
    let response = match query.format {
        ReceiptFormat::Text => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", receipt.file_name()),
                ),
            ],
            receipt.render_text(),
        )
            .into_response(),
        ReceiptFormat::Html => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8".to_string())],
            receipt.render_html(),
        )
            .into_response(),
    };
    Ok(response)
}
