//! Request identity.
//!
//! Authentication happens at the gateway, which forwards the verified identity as headers. These
//! middlewares turn the headers into an explicit [`Session`] extension for the handlers.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    core::app_error::AppError,
    location::LocationScope,
    session::{Role, Session, SessionUser},
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_LOCATION_HEADER: &str = "x-user-location";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Builds the session from gateway headers. Missing or malformed identity means anonymous.
pub fn session_from_headers(headers: &HeaderMap) -> Session {
    let Some(raw_id) = header(headers, USER_ID_HEADER) else {
        return Session::anonymous();
    };
    let Ok(user_id) = raw_id.parse::<Uuid>() else {
        warn!(user_id = raw_id, "Ignoring malformed user id header");
        return Session::anonymous();
    };

    let role = match header(headers, USER_ROLE_HEADER).map(str::to_ascii_lowercase).as_deref() {
        Some("admin") => Role::Admin,
        Some("staff") => Role::Staff,
        _ => Role::Customer,
    };
    let raw_location = header(headers, USER_LOCATION_HEADER);
    let parsed = raw_location.and_then(|raw| raw.parse::<LocationScope>().ok());
    let (role, location) = match (role, parsed) {
        (role, Some(location)) => (role, location),
        (Role::Customer, None) => (Role::Customer, LocationScope::All),
        // A staff identity without an assignment gets no staff rights.
        (role, None) => {
            warn!(
                %user_id,
                ?role,
                location = raw_location.unwrap_or_default(),
                "Staff session without a valid location assignment, treating as customer"
            );
            (Role::Customer, LocationScope::All)
        }
    };

    Session::authenticated(SessionUser {
        user_id,
        email: header(headers, USER_EMAIL_HEADER).map(str::to_string),
        role,
        location,
    })
}

pub async fn session_extraction(mut req: Request, next: Next) -> Response {
    let session = session_from_headers(req.headers());
    req.extensions_mut().insert(session);
    next.run(req).await
}

pub async fn staff_authorization(mut req: Request, next: Next) -> Response {
    let session = session_from_headers(req.headers());
    if !session.is_authenticated() {
        return AppError::Unauthorized("Logga in för att fortsätta".into()).into_response();
    }
    if !session.is_staff() {
        return AppError::ForbiddenResource("Endast personal har åtkomst".into()).into_response();
    }
    req.extensions_mut().insert(session);
    next.run(req).await
}
