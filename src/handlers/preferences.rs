use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};

use crate::{
    auth::Session,
    entities::user_preferences,
    error::ApiError,
    models::{common::MessageResponse, preferences::UpdatePreferencesRequest},
    services::record_validator::MAX_SYMBOL_LEN,
    AppState,
};

/// Handler for GET /api/v1/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<user_preferences::Model>, ApiError> {
    let prefs = state
        .preferences
        .get_or_create(&session.identity_id, session.traits.email())
        .await?;
    Ok(Json(prefs))
}

/// Handler for PUT /api/v1/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Result<Json<UpdatePreferencesRequest>, JsonRejection>,
) -> Result<Json<user_preferences::Model>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request_with("Invalid request body", e.body_text()))?;

    if request.is_empty() {
        return Err(ApiError::bad_request("No preferences to update"));
    }
    for symbol in request
        .selected_symbols
        .iter()
        .chain(request.watchlist.iter())
        .flatten()
    {
        check_symbol(symbol)?;
    }

    let prefs = state
        .preferences
        .update(&session.identity_id, session.traits.email(), request)
        .await?;
    Ok(Json(prefs))
}

/// Handler for POST /api/v1/preferences/watchlist/{symbol}
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(symbol): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let symbol = check_symbol(&symbol)?;
    state
        .preferences
        .add_to_watchlist(&session.identity_id, session.traits.email(), symbol)
        .await?;
    Ok(Json(MessageResponse::new("Symbol added to watchlist").with_symbol(symbol)))
}

/// Handler for DELETE /api/v1/preferences/watchlist/{symbol}
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(symbol): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let symbol = check_symbol(&symbol)?;
    state
        .preferences
        .remove_from_watchlist(&session.identity_id, session.traits.email(), symbol)
        .await?;
    Ok(Json(MessageResponse::new("Symbol removed from watchlist").with_symbol(symbol)))
}

fn check_symbol(symbol: &str) -> Result<&str, ApiError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ApiError::bad_request("Symbol is required"));
    }
    if symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(ApiError::bad_request_with(
            "Invalid symbol",
            format!("symbol longer than {} characters", MAX_SYMBOL_LEN),
        ));
    }
    Ok(symbol)
}
