use axum::{
    Extension,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use super::assigned_scope;
use crate::{
    core::{app_error::AppError, app_error::StdResponse, app_state::AppState},
    models::NotificationEntity,
    session::Session,
    store::NotificationQuery,
    terminal::permission::{PermissionAdvice, PermissionState, advise},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/notifications",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_notifications))
            .routes(utoipa_axum::routes!(mark_read))
            .routes(utoipa_axum::routes!(get_permission_advice)),
    )
}

#[derive(Deserialize, IntoParams)]
struct ListNotificationsQuery {
    #[serde(default)]
    unread_only: bool,
}

/// Fetch notifications for the staff member's locations, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Staff notifications"],
    security(("bearerAuth" = [])),
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "List notifications", body = StdResponse<Vec<NotificationEntity>, String>)
    )
)]
async fn get_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = state
        .store
        .list_notifications(NotificationQuery {
            scope: assigned_scope(&session)?,
            unread_only: query.unread_only,
        })
        .await?;

    Ok(StdResponse {
        data: Some(notifications),
        message: Some("Get notifications successfully"),
    })
}

/// Mark a notification as read.
#[utoipa::path(
    patch,
    path = "/{id}/read",
    tags = ["Staff notifications"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = StdResponse<NotificationEntity, String>),
        (status = 404, description = "Notification not found")
    )
)]
async fn mark_read(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let notification = state.store.get_notification(id).await?;
    // notifications outside the staff member's locations are reported as missing
    if !notification.visible_to(assigned_scope(&session)?) {
        return Err(AppError::NotFound);
    }

    let updated = state.store.mark_notification_read(id).await?;
    Ok(StdResponse {
        data: Some(updated),
        message: Some("Mark notification as read successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
struct PermissionQuery {
    /// Permission state reported by the browser. Absent when the API is missing.
    #[param(value_type = Option<String>)]
    state: Option<PermissionState>,
    /// Whether the terminal page runs in a secure context.
    #[serde(default = "default_secure")]
    secure: bool,
}

fn default_secure() -> bool {
    true
}

/// What the terminal should show about desktop notifications on this device.
#[utoipa::path(
    get,
    path = "/permission",
    tags = ["Staff notifications"],
    security(("bearerAuth" = [])),
    params(PermissionQuery),
    responses(
        (status = 200, description = "Permission advice", body = StdResponse<PermissionAdvice, String>)
    )
)]
async fn get_permission_advice(
    headers: HeaderMap,
    Query(query): Query<PermissionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let state = PermissionState::resolve(query.state, query.secure);

    Ok(StdResponse {
        data: Some(advise(state, user_agent)),
        message: Some("Get permission advice successfully"),
    })
}
