//! Pulls the session credential out of an inbound request.
//!
//! Sources are tried in a fixed order and the first hit wins:
//! 1. the session cookie
//! 2. `Authorization: Bearer <token>` or `Authorization: Session <token>`
//! 3. `X-Session-Token`

use std::fmt;

use axum::http::{header, HeaderMap};

use crate::logging::mask_token;

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Opaque session token. Lives for one request and is never persisted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        mask_token(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct TokenExtractor {
    cookie_name: String,
}

impl TokenExtractor {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// `None` means the request carries no credential at all.
    pub fn extract(&self, headers: &HeaderMap) -> Option<Credential> {
        self.from_cookie(headers)
            .or_else(|| from_authorization(headers))
            .or_else(|| from_session_header(headers))
            .map(Credential::new)
    }

    fn from_cookie(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.cookie_name && !value.is_empty())
            .map(|(_, value)| value.to_string())
    }
}

fn from_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Session "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn from_session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_TOKEN_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
