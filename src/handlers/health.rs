use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub identity_provider: &'static str,
}

/// Handler for GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        service: env!("CARGO_PKG_NAME"),
    })
}

/// Handler for GET /ready
/// Only the store decides readiness; the identity provider is reported
/// for diagnostics.
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    if let Err(e) = state.market.ping().await {
        tracing::error!(error = %e, "database not ready");
        return Err(ApiError::Unavailable("Database not ready".to_string()));
    }

    let identity_provider = if state.sessions.health_check().await {
        "reachable"
    } else {
        "unreachable"
    };

    Ok(Json(ReadyResponse {
        status: "ready",
        database: "connected",
        identity_provider,
    }))
}
