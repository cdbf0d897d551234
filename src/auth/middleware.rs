use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use super::role::{AuthorizationGate, Decision};
use super::session::{AuthFailure, Session};
use crate::error::ApiError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Rejects the request with 401 unless it carries a credential the identity
/// provider accepts. On success the `Session` is placed in the request
/// extensions for handlers and the role gate.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = match state.sessions.authenticate(req.headers()).await {
        Ok(session) => session,
        Err(failure) => {
            log_failure(&failure, &req);
            return Err(ApiError::unauthorized(failure, &state.config.auth));
        }
    };

    tracing::debug!(
        user_id = %session.identity_id,
        session_id = %session.session_id,
        path = %req.uri().path(),
        "authentication successful"
    );

    let user_id = HeaderValue::from_str(&session.identity_id).ok();
    let session_id = HeaderValue::from_str(&session.session_id).ok();
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if let Some(value) = user_id {
        headers.insert(USER_ID_HEADER, value);
    }
    if let Some(value) = session_id {
        headers.insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}

/// Must sit inside `require_session`.
pub async fn require_role(
    State(gate): State<AuthorizationGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(session) = req.extensions().get::<Session>() else {
        return Err(ApiError::Internal(
            "role gate reached without an authenticated session".to_string(),
        ));
    };

    match gate.authorize(session) {
        Decision::Allow => Ok(next.run(req).await),
        Decision::Deny { required, actual } => {
            tracing::warn!(
                user_id = %session.identity_id,
                user_role = %actual,
                required_role = %required,
                path = %req.uri().path(),
                "insufficient permissions"
            );
            Err(ApiError::Forbidden { required, actual })
        }
    }
}

fn log_failure(failure: &AuthFailure, req: &Request) {
    let path = req.uri().path();
    let method = req.method().as_str();
    match failure {
        AuthFailure::NoCredential => {
            tracing::warn!(path, method, "no session token provided");
        }
        AuthFailure::Unreachable(_) | AuthFailure::Malformed(_) => {
            tracing::error!(path, method, error = %failure, "session validation failed");
        }
        _ => {
            tracing::warn!(path, method, error = %failure, "session rejected");
        }
    }
}
