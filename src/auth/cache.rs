//! Optional short-lived cache of validated sessions.
//!
//! Off unless `SESSION_CACHE_TTL_SECS` is non-zero. Entries are re-checked for
//! activity and expiry on every hit and are evicted on logout.

use std::time::Duration;

use moka::future::Cache;

use super::session::Session;
use super::token::Credential;

#[derive(Clone)]
pub struct SessionCache {
    sessions: Cache<Credential, Session>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self { sessions }
    }

    pub async fn get(&self, credential: &Credential) -> Option<Session> {
        self.sessions.get(credential).await
    }

    pub async fn insert(&self, credential: Credential, session: Session) {
        self.sessions.insert(credential, session).await;
    }

    pub async fn invalidate(&self, credential: &Credential) {
        self.sessions.invalidate(credential).await;
    }
}
