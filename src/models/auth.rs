use serde::{Deserialize, Serialize};

use crate::auth::{Role, Session};
use crate::entities::user_preferences;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl From<&Session> for AuthUser {
    fn from(session: &Session) -> Self {
        Self {
            id: session.identity_id.clone(),
            email: session.traits.email().map(str::to_string),
            role: session.traits.role(),
        }
    }
}

/// `GET /auth/status`. Login hints are only present for anonymous callers,
/// the user and logout URL only for authenticated ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kratos_ui: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserResponse {
    pub authenticated: bool,
    pub user: AuthUser,
    pub session_id: String,
    pub preferences: user_preferences::Model,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUrlQuery {
    pub return_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUrlResponse {
    pub login_url: String,
    pub kratos_api: String,
    pub return_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    pub logout_url: String,
    pub redirect: String,
}
