#![allow(dead_code)]

use std::collections::HashMap;

use axum::{body::Body, http::Request, Router};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use market_data_backend::{
    config::Config,
    entities::market_data::DataSource,
    router::build_router,
    services::record_validator::ValidatedRecord,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Fresh in-memory SQLite database with the production migrations applied.
/// A single pooled connection keeps every query on the same database.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// Make every insert of `symbol` fail with an error that is not a unique
/// constraint violation.
pub async fn reject_inserts_of(db: &DatabaseConnection, symbol: &str) {
    db.execute_unprepared(&format!(
        "CREATE TRIGGER reject_{name} BEFORE INSERT ON market_data \
         WHEN NEW.symbol = '{symbol}' \
         BEGIN SELECT RAISE(ABORT, 'rejected by trigger'); END;",
        name = symbol.replace('.', "_"),
        symbol = symbol
    ))
    .await
    .expect("Failed to install trigger");
}

pub fn test_config(identity_url: &str, yahoo_url: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("KRATOS_PUBLIC_URL".to_string(), identity_url.to_string());
    vars.insert("KRATOS_BROWSER_URL".to_string(), "http://localhost:4433".to_string());
    vars.insert("KRATOS_UI_URL".to_string(), "http://localhost:4455".to_string());
    vars.insert("YAHOO_API_BASE_URL".to_string(), yahoo_url.to_string());
    vars.insert("SESSION_VALIDATION_TIMEOUT_SECS".to_string(), "2".to_string());
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("Invalid test config")
}

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub identity: MockServer,
    pub yahoo: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Like `spawn`, with extra environment overrides.
    pub async fn spawn_with(extra: &[(&str, &str)]) -> Self {
        let db = setup_test_db().await;
        let identity = MockServer::start().await;
        let yahoo = MockServer::start().await;

        let config = test_config(&identity.uri(), &yahoo.uri(), extra);
        let state = AppState::new(db.clone(), config).expect("Failed to build state");

        Self {
            router: build_router(state),
            db,
            identity,
            yahoo,
        }
    }

    /// Register `token` as a valid session for a user with `role`.
    pub async fn login(&self, token: &str, user_id: &str, role: &str) {
        mount_session(
            &self.identity,
            token,
            whoami_body(user_id, Some(role), true, Utc::now() + Duration::hours(1)),
        )
        .await;
    }

    pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status().as_u16();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
        };
        (status, body)
    }
}

pub fn whoami_body(
    user_id: &str,
    role: Option<&str>,
    active: bool,
    expires_at: DateTime<Utc>,
) -> Value {
    let mut traits = json!({ "email": format!("{}@example.com", user_id) });
    if let Some(role) = role {
        traits["role"] = json!(role);
    }
    json!({
        "id": format!("sess-{}", user_id),
        "active": active,
        "identity": {
            "id": user_id,
            "schema_id": "default",
            "state": "active",
            "traits": traits
        },
        "authenticated_at": (expires_at - Duration::hours(2)).to_rfc3339(),
        "expires_at": expires_at.to_rfc3339()
    })
}

pub async fn mount_session(server: &MockServer, token: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .and(header("x-session-token", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method("GET").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method("DELETE").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

pub fn send_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_token(Request::builder().method(method).uri(uri), token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn multipart_csv(uri: &str, token: Option<&str>, filename: &str, csv: &str) -> Request<Body> {
    let boundary = "----market-data-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        f = filename,
        csv = csv
    );
    with_token(Request::builder().method("POST").uri(uri), token)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

fn with_token(
    builder: axum::http::request::Builder,
    token: Option<&str>,
) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header("authorization", format!("Bearer {}", token)),
        None => builder,
    }
}

pub fn record(symbol: &str, day: u32, close: Decimal, source: DataSource) -> ValidatedRecord {
    ValidatedRecord::try_new(
        symbol,
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
        close,
        close,
        close,
        close,
        1_000_000,
        source,
    )
    .unwrap()
}

pub fn json_row(symbol: &str, date: &str, close: f64, source: &str) -> Value {
    json!({
        "symbol": symbol,
        "date": date,
        "open": close,
        "high": close,
        "low": close,
        "close": close,
        "volume": 1000000,
        "source": source
    })
}
