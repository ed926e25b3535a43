//! Staff-only routes. Every route here sits behind [`middleware::staff_authorization`].

pub mod bookings;
pub mod feed;
pub mod notifications;
pub mod orders;

use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{app_error::AppError, app_state::AppState, middleware},
    location::LocationScope,
    session::Session,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff",
        OpenApiRouter::new()
            .merge(orders::routes_with_openapi())
            .merge(notifications::routes_with_openapi())
            .merge(bookings::routes_with_openapi())
            .merge(feed::routes_with_openapi())
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

/// Locations the signed-in staff member is assigned to.
///
/// The gateway headers are only trusted for staff with a valid assignment, see
/// [`middleware::session_from_headers`]. Anything else is refused.
pub(crate) fn assigned_scope(session: &Session) -> Result<LocationScope, AppError> {
    session
        .user()
        .filter(|user| user.role.is_staff())
        .map(|user| user.location)
        .ok_or_else(|| AppError::ForbiddenResource("Endast personal har åtkomst".into()))
}
