//! Remote session validation against the identity provider.
//!
//! Every protected request costs one `GET /sessions/whoami` round trip unless
//! the optional session cache is switched on. Nothing is retried: a failed
//! validation fails the request.

use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::cache::SessionCache;
use super::role::Role;
use super::token::{Credential, TokenExtractor, SESSION_TOKEN_HEADER};
use crate::config::{require_http_url, AuthConfig, ConfigError};

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("no session credential presented")]
    NoCredential,
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
    #[error("identity provider rejected the session with status {status}")]
    Rejected { status: u16 },
    #[error("identity provider returned an undecodable session: {0}")]
    Malformed(String),
    #[error("session {session_id} is not active")]
    Inactive { session_id: String },
    #[error("session {session_id} expired at {expires_at}")]
    Expired {
        session_id: String,
        expires_at: DateTime<Utc>,
    },
}

impl AuthFailure {
    /// Message safe to show the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthFailure::NoCredential => "Authentication required",
            AuthFailure::Unreachable(_) => "Authentication service unavailable",
            AuthFailure::Rejected { .. } | AuthFailure::Malformed(_) => {
                "Invalid or expired session"
            }
            AuthFailure::Inactive { .. } => "Session inactive",
            AuthFailure::Expired { .. } => "Session expired",
        }
    }
}

/// Provider-owned identity attributes with typed access to the fields this
/// service relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityTraits(Map<String, Value>);

impl IdentityTraits {
    /// Non-object values yield an empty trait set.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    pub fn role(&self) -> Role {
        Role::from_trait(self.0.get("role"))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// A session the identity provider vouched for on this request.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub active: bool,
    pub identity_id: String,
    pub traits: IdentityTraits,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    id: String,
    #[serde(default)]
    active: bool,
    identity: WhoamiIdentity,
    #[serde(default)]
    authenticated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WhoamiIdentity {
    id: String,
    #[serde(default)]
    traits: Value,
}

impl From<WhoamiResponse> for Session {
    fn from(body: WhoamiResponse) -> Self {
        Session {
            session_id: body.id,
            active: body.active,
            identity_id: body.identity.id,
            traits: IdentityTraits::from_value(body.identity.traits),
            authenticated_at: body.authenticated_at,
            expires_at: body.expires_at,
        }
    }
}

/// Checks the provider does not guarantee to have applied. Inactivity is
/// reported before expiry.
pub fn check_session(session: Session, now: DateTime<Utc>) -> Result<Session, AuthFailure> {
    if !session.active {
        return Err(AuthFailure::Inactive {
            session_id: session.session_id,
        });
    }
    if let Some(expires_at) = session.expires_at {
        if now >= expires_at {
            return Err(AuthFailure::Expired {
                session_id: session.session_id,
                expires_at,
            });
        }
    }
    Ok(session)
}

/// Upper bound for the readiness check, which only reports reachability.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct SessionValidator {
    client: Client,
    whoami_url: Url,
    health_url: Url,
    extractor: TokenExtractor,
    timeout: Duration,
    cache: Option<SessionCache>,
}

impl SessionValidator {
    /// Fails when the identity-provider URLs are missing or unusable, so a
    /// misconfigured process never starts serving.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        let internal = require_http_url("KRATOS_PUBLIC_URL", &config.identity_internal_url)?;
        require_http_url("KRATOS_BROWSER_URL", &config.identity_browser_url)?;

        let base = internal.as_str().trim_end_matches('/');
        let whoami_url = require_http_url("KRATOS_PUBLIC_URL", &format!("{}/sessions/whoami", base))?;
        let health_url = require_http_url("KRATOS_PUBLIC_URL", &format!("{}/health/ready", base))?;

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "KRATOS_PUBLIC_URL",
                value: config.identity_internal_url.clone(),
                reason: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            whoami_url,
            health_url,
            extractor: TokenExtractor::new(config.session_cookie_name.clone()),
            timeout: config.validation_timeout,
            cache: config.session_cache_ttl.map(SessionCache::new),
        })
    }

    pub fn extractor(&self) -> &TokenExtractor {
        &self.extractor
    }

    /// Extract the credential from `headers` and validate it.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Session, AuthFailure> {
        let credential = self
            .extractor
            .extract(headers)
            .ok_or(AuthFailure::NoCredential)?;
        self.validate(&credential).await
    }

    pub async fn validate(&self, credential: &Credential) -> Result<Session, AuthFailure> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(credential).await {
                return match check_session(cached, Utc::now()) {
                    Ok(session) => Ok(session),
                    Err(failure) => {
                        cache.invalidate(credential).await;
                        Err(failure)
                    }
                };
            }
        }

        let session = check_session(self.introspect(credential).await?, Utc::now())?;

        if let Some(cache) = &self.cache {
            cache.insert(credential.clone(), session.clone()).await;
        }
        Ok(session)
    }

    /// Drop a credential from the session cache, if there is one.
    pub async fn invalidate(&self, credential: &Credential) {
        if let Some(cache) = &self.cache {
            cache.invalidate(credential).await;
        }
    }

    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url.clone())
            .timeout(self.timeout.min(HEALTH_CHECK_TIMEOUT))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "identity provider health check failed");
                false
            }
        }
    }

    async fn introspect(&self, credential: &Credential) -> Result<Session, AuthFailure> {
        let token = credential.as_str();

        // The provider's accepted transport differs between deployments, so
        // the token goes out as bearer, custom header and cookie at once.
        let response = self
            .client
            .get(self.whoami_url.clone())
            .bearer_auth(token)
            .header(SESSION_TOKEN_HEADER, token)
            .header(
                header::COOKIE,
                format!("{}={}", self.extractor.cookie_name(), token),
            )
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    timeout = e.is_timeout(),
                    token_hint = %credential.masked(),
                    "session introspection request failed"
                );
                AuthFailure::Unreachable(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), token_hint = %credential.masked(), "identity provider responded");

        if status != StatusCode::OK {
            return Err(AuthFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthFailure::Unreachable(e.to_string()))?;

        serde_json::from_slice::<WhoamiResponse>(&body)
            .map(Session::from)
            .map_err(|e| AuthFailure::Malformed(e.to_string()))
    }
}
