//! HTTP-facing error taxonomy.
//!
//! Subsystems return their own error types; handlers and middleware convert
//! them here so every failure leaves the service as a JSON body with a
//! stable `error` field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

use crate::auth::role::Role;
use crate::auth::session::AuthFailure;
use crate::config::AuthConfig;
use crate::models::common::ErrorResponse;
use crate::services::ingestion::IngestionError;
use crate::services::record_validator::RowError;
use crate::services::yahoo::YahooError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {failure}")]
    Unauthorized {
        failure: AuthFailure,
        login_url: String,
        login_ui: String,
    },

    #[error("role {actual} does not satisfy {required}")]
    Forbidden { required: String, actual: Role },

    #[error("bad request: {error}")]
    BadRequest {
        error: String,
        message: Option<String>,
    },

    #[error("{} invalid rows", .errors.len())]
    Validation { errors: Vec<RowError> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Upstream(#[from] YahooError),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl ApiError {
    pub fn unauthorized(failure: AuthFailure, config: &AuthConfig) -> Self {
        ApiError::Unauthorized {
            failure,
            login_url: config.login_url(),
            login_ui: config.login_ui(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            message: None,
        }
    }

    pub fn bad_request_with(error: impl Into<String>, message: impl ToString) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            message: Some(message.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized {
                failure,
                login_url,
                login_ui,
            } => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": failure.public_message(),
                    "login_url": login_url,
                    "kratos_ui": login_ui,
                })),
            )
                .into_response(),

            ApiError::Forbidden { required, actual } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Insufficient permissions",
                    "required_role": required,
                    "user_role": actual,
                })),
            )
                .into_response(),

            ApiError::BadRequest { error, message } => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error, message }),
            )
                .into_response(),

            ApiError::Validation { errors } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid market data",
                    "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })),
            )
                .into_response(),

            ApiError::NotFound(error) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(error))).into_response()
            }

            ApiError::Conflict(error) => {
                (StatusCode::CONFLICT, Json(ErrorResponse::new(error))).into_response()
            }

            ApiError::Ingestion(err) => {
                tracing::error!(error = %err, "ingestion failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to import data",
                        "strategy": err.strategy,
                        "rows_uncommitted": err.uncommitted,
                        "rows_skipped": err.skipped,
                    })),
                )
                    .into_response()
            }

            ApiError::Upstream(YahooError::InvalidSymbol { reason, .. }) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Invalid symbol".to_string(),
                    message: Some(reason),
                }),
            )
                .into_response(),

            ApiError::Upstream(err) => {
                tracing::error!(error = %err, "external price source failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        error: "Failed to fetch external data".to_string(),
                        message: Some(err.to_string()),
                    }),
                )
                    .into_response()
            }

            ApiError::Unavailable(error) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse::new(error))).into_response()
            }

            ApiError::Internal(error) => {
                tracing::error!(error = %error, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Internal server error")),
                )
                    .into_response()
            }

            ApiError::Database(err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Database error")),
                )
                    .into_response()
            }
        }
    }
}
