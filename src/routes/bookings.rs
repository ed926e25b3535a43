use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    bookings::BookingView,
    core::{app_state::AppState, middleware},
    location::LocationScope,
    session::Session,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/bookings",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_bookings))
            .route_layer(axum::middleware::from_fn(middleware::session_extraction)),
    )
}

#[derive(Deserialize, IntoParams)]
struct ListBookingsQuery {
    /// `all` or a location code.
    #[param(value_type = Option<String>)]
    location: Option<LocationScope>,
}

#[derive(Serialize, ToSchema)]
struct BookingsRes {
    success: bool,
    bookings: Vec<BookingView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// List bookings ordered by date and time.
///
/// Contact details are only included for staff.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Bookings"],
    params(ListBookingsQuery),
    responses(
        (status = 200, description = "List bookings", body = BookingsRes),
        (status = 500, description = "Bookings could not be loaded", body = BookingsRes)
    )
)]
async fn get_bookings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListBookingsQuery>,
) -> Response {
    let scope = query.location.unwrap_or_default();
    match state.store.list_bookings(scope).await {
        Ok(bookings) => {
            let with_contact = session.is_staff();
            let bookings = bookings
                .into_iter()
                .map(|booking| BookingView::new(booking, with_contact))
                .collect();
            Json(BookingsRes {
                success: true,
                bookings,
                error: None,
            })
            .into_response()
        }
        Err(err) => {
            error!(error = %err, "Failed to list bookings");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BookingsRes {
                    success: false,
                    bookings: Vec::new(),
                    error: Some("Kunde inte hämta bokningar".into()),
                }),
            )
                .into_response()
        }
    }
}
