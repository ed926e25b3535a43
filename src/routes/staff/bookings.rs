use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use super::assigned_scope;
use crate::{
    bookings::BookingView,
    core::{app_error::AppError, app_error::StdResponse, app_state::AppState},
    models::BookingEntity,
    session::Session,
    status::BookingStatus,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/bookings",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(update_booking_status))
            .routes(utoipa_axum::routes!(delete_booking)),
    )
}

/// Bookings outside the staff member's locations are reported as missing.
async fn visible_booking(
    state: &AppState,
    session: &Session,
    id: i32,
) -> Result<BookingEntity, AppError> {
    state
        .store
        .list_bookings(assigned_scope(session)?)
        .await?
        .into_iter()
        .find(|booking| booking.id == id)
        .ok_or(AppError::NotFound)
}

#[derive(Deserialize, ToSchema)]
struct UpdateBookingStatusReq {
    status: BookingStatus,
}

/// Confirm, complete or cancel a booking.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Staff bookings"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID to update")
    ),
    request_body = UpdateBookingStatusReq,
    responses(
        (status = 200, description = "Booking status updated", body = StdResponse<BookingView, String>),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
async fn update_booking_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<UpdateBookingStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let booking = visible_booking(&state, &session, id).await?;

    let current = booking.status().ok_or_else(|| {
        AppError::Conflict(format!("Bokningen har okänd status: {}", booking.status))
    })?;
    if !current.can_transition_to(body.status) {
        return Err(AppError::Conflict(format!(
            "Kan inte ändra bokning från {} till {}",
            current, body.status
        )));
    }

    let updated = state.store.update_booking_status(id, body.status).await?;
    info!(booking_id = id, from = %current, to = %body.status, "Booking status updated");

    Ok(StdResponse {
        data: Some(BookingView::new(updated, true)),
        message: Some("Update booking status successfully"),
    })
}

/// Delete a booking.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Staff bookings"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID to delete")
    ),
    responses(
        (status = 200, description = "Booking deleted", body = StdResponse<BookingView, String>),
        (status = 404, description = "Booking not found")
    )
)]
async fn delete_booking(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    visible_booking(&state, &session, id).await?;

    let deleted = state.store.delete_booking(id).await?;
    info!(booking_id = id, "Booking deleted");

    Ok(StdResponse {
        data: Some(BookingView::new(deleted, true)),
        message: Some("Delete booking successfully"),
    })
}
