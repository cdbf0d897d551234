use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    auth::{
        middleware::{require_role, require_session, SESSION_ID_HEADER, USER_ID_HEADER},
        token::SESSION_TOKEN_HEADER,
        AuthorizationGate, Role,
    },
    handlers::{auth, health, market_data, preferences, upload},
    AppState,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/auth/status", get(auth::auth_status))
        .route("/auth/login-url", get(auth::login_url))
        .route("/auth/logout", post(auth::logout));

    let admin_only = Router::new()
        .route(
            "/market-data/{symbol}",
            delete(market_data::delete_market_data),
        )
        .route_layer(from_fn_with_state(
            AuthorizationGate::require(Role::Admin),
            require_role,
        ));

    let api = Router::new()
        .route(
            "/market-data",
            get(market_data::list_market_data).post(market_data::create_market_data),
        )
        .route("/market-data/bulk", post(market_data::bulk_create_market_data))
        .route("/market-data/symbols", get(market_data::list_symbols))
        .route(
            "/market-data/yahoo/{symbol}",
            post(market_data::fetch_yahoo_data),
        )
        .route(
            "/market-data/{symbol}",
            get(market_data::get_market_data_by_symbol),
        )
        .route(
            "/market-data/{symbol}/latest",
            get(market_data::get_latest_market_data),
        )
        .route("/upload/csv", post(upload::upload_csv))
        .route(
            "/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route(
            "/preferences/watchlist/{symbol}",
            post(preferences::add_to_watchlist).delete(preferences::remove_from_watchlist),
        )
        .merge(admin_only);

    let protected = Router::new()
        .nest("/api/v1", api)
        .route("/auth/me", get(auth::current_user))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let request_timeout = state.config.server.request_timeout;
    let max_upload_bytes = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config.cors_origins);

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                )),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    MakeRequestUuid,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(cors)
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::COOKIE,
            HeaderName::from_static(SESSION_TOKEN_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(SESSION_ID_HEADER),
        ])
        .max_age(Duration::from_secs(12 * 60 * 60))
}
