use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::{checkout::CheckoutError, store::StoreError};

/// Envelope shared by every JSON response.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    ForbiddenResource(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error("Something went wrong on our side ({0:#})")]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound,
            StoreError::Other(err) => AppError::Other(err),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::LoginRequired { .. } => AppError::Unauthorized(err.to_string()),
            CheckoutError::Persistence(StoreError::Other(source)) => {
                AppError::Other(source.context("Beställningen kunde inte sparas, försök igen"))
            }
            CheckoutError::Persistence(StoreError::NotFound) => AppError::NotFound,
            err => AppError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::Other(err) => {
                error!("Unhandled error: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = StdResponse::<(), String> {
            data: None,
            message: Some(self.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
