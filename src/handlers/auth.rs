use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Extension, Json,
};

use crate::{
    auth::Session,
    error::ApiError,
    models::auth::{
        AuthStatusResponse, AuthUser, CurrentUserResponse, LoginUrlQuery, LoginUrlResponse,
        LogoutResponse,
    },
    AppState,
};

/// Handler for GET /auth/status
/// Never fails on a bad credential; reports `authenticated: false` instead.
pub async fn auth_status(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthStatusResponse> {
    let auth = &state.config.auth;

    match state.sessions.authenticate(&headers).await {
        Ok(session) => Json(AuthStatusResponse {
            authenticated: true,
            user: Some(AuthUser::from(&session)),
            session_id: Some(session.session_id),
            login_url: None,
            kratos_ui: None,
            logout_url: Some(auth.logout_url()),
        }),
        Err(failure) => {
            tracing::debug!(reason = %failure, "auth status: not authenticated");
            Json(AuthStatusResponse {
                authenticated: false,
                user: None,
                session_id: None,
                login_url: Some(auth.login_ui()),
                kratos_ui: Some(auth.login_ui_url.clone()),
                logout_url: None,
            })
        }
    }
}

/// Handler for GET /auth/me
pub async fn current_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let preferences = state
        .preferences
        .get_or_create(&session.identity_id, session.traits.email())
        .await?;

    Ok(Json(CurrentUserResponse {
        authenticated: true,
        user: AuthUser::from(&session),
        session_id: session.session_id,
        preferences,
    }))
}

/// Handler for GET /auth/login-url
pub async fn login_url(
    State(state): State<AppState>,
    Query(query): Query<LoginUrlQuery>,
) -> Json<LoginUrlResponse> {
    let auth = &state.config.auth;
    let return_to = query
        .return_to
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("{}/dashboard", auth.frontend_url.trim_end_matches('/')));

    Json(LoginUrlResponse {
        login_url: auth.login_ui(),
        kratos_api: auth.login_url(),
        return_to,
    })
}

/// Handler for POST /auth/logout
/// The session itself is ended by the browser at the identity provider;
/// this only drops the credential from the local session cache.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<LogoutResponse> {
    if let Some(credential) = state.sessions.extractor().extract(&headers) {
        tracing::info!(token_hint = %credential.masked(), "User logout");
        state.sessions.invalidate(&credential).await;
    }

    let auth = &state.config.auth;
    Json(LogoutResponse {
        message: "To complete logout, visit the logout URL".to_string(),
        logout_url: auth.logout_url(),
        redirect: format!("{}/", auth.frontend_url.trim_end_matches('/')),
    })
}
