pub mod bookings;
pub mod checkout;
pub mod staff;

use anyhow::Result;
use axum::Router;
use utoipa_axum::router::OpenApiRouter;

use crate::core::{app_state::AppState, swagger};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(checkout::routes_with_openapi())
        .merge(bookings::routes_with_openapi())
        .merge(staff::routes_with_openapi())
}

/// The full HTTP application with API docs mounted at `/swagger-ui`.
pub fn app(state: AppState) -> Result<Router> {
    let (router, mut openapi) = routes_with_openapi().split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Bistro OrderService API")
        .version(env!("CARGO_PKG_VERSION"))
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    Ok(router.merge(swagger_ui).with_state(state))
}
