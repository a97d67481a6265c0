use std::{collections::HashMap, sync::Arc};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_token";

/// Lifetime of a session that only carries flashes for an anonymous client.
const ANONYMOUS_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Error => "error",
        }
    }
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug)]
struct SessionRecord {
    username: Option<String>,
    flashes: Vec<Flash>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Server-side sessions keyed by the opaque token in [`SESSION_COOKIE`].
///
/// Anonymous clients get a short-lived session as soon as something is
/// flashed to them, so messages survive the redirect to the login page. It is
/// dropped once those messages have been shown.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionRecord>>>,
    ttl_days: i64,
}

impl SessionStore {
    pub fn new(ttl_days: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl_days,
        }
    }

    fn login_ttl(&self) -> ChronoDuration {
        ChronoDuration::days(self.ttl_days)
    }

    pub async fn current_user(&self, jar: &CookieJar) -> Option<String> {
        let token = token_from(jar)?;
        let guard = self.sessions.read().await;
        guard
            .get(&token)
            .filter(|record| record.is_live(Utc::now()))
            .and_then(|record| record.username.clone())
    }

    /// Logs `username` in under a freshly issued token; pending flashes move over.
    pub async fn start(&self, jar: CookieJar, username: &str) -> CookieJar {
        let now = Utc::now();
        let token = Uuid::new_v4();
        let mut guard = self.sessions.write().await;

        let carried = token_from(&jar)
            .and_then(|old| guard.remove(&old))
            .filter(|record| record.is_live(now))
            .map(|record| record.flashes)
            .unwrap_or_default();

        guard.insert(
            token,
            SessionRecord {
                username: Some(username.to_string()),
                flashes: carried,
                expires_at: now + self.login_ttl(),
            },
        );
        drop(guard);

        jar.add(session_cookie(token, self.login_ttl()))
    }

    /// Forgets the logged-in user; the session lingers as an anonymous one
    /// for pending flashes.
    pub async fn end(&self, jar: CookieJar) -> CookieJar {
        if let Some(token) = token_from(&jar) {
            if let Some(record) = self.sessions.write().await.get_mut(&token) {
                record.username = None;
                record.expires_at = Utc::now() + ChronoDuration::minutes(ANONYMOUS_TTL_MINUTES);
            }
        }
        jar
    }

    pub async fn flash(
        &self,
        jar: CookieJar,
        level: FlashLevel,
        message: impl Into<String>,
    ) -> CookieJar {
        let now = Utc::now();
        let flash = Flash {
            level,
            message: message.into(),
        };
        let mut guard = self.sessions.write().await;

        if let Some(token) = token_from(&jar) {
            if let Some(record) = guard.get_mut(&token).filter(|record| record.is_live(now)) {
                record.flashes.push(flash);
                return jar;
            }
        }

        let token = Uuid::new_v4();
        guard.insert(
            token,
            SessionRecord {
                username: None,
                flashes: vec![flash],
                expires_at: now + ChronoDuration::minutes(ANONYMOUS_TTL_MINUTES),
            },
        );
        drop(guard);

        jar.add(session_cookie(
            token,
            ChronoDuration::minutes(ANONYMOUS_TTL_MINUTES),
        ))
    }

    /// Returns and clears the queued flashes. An anonymous session has
    /// nothing left to hold once they are taken, so it is dropped.
    pub async fn take_flashes(&self, jar: &CookieJar) -> Vec<Flash> {
        let Some(token) = token_from(jar) else {
            return Vec::new();
        };
        let mut guard = self.sessions.write().await;
        let Some(record) = guard.get_mut(&token) else {
            return Vec::new();
        };
        if !record.is_live(Utc::now()) {
            return Vec::new();
        }

        let flashes = std::mem::take(&mut record.flashes);
        if record.username.is_none() {
            guard.remove(&token);
        }
        flashes
    }

    /// Drops expired sessions, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.sessions.write().await;
        let before = guard.len();
        guard.retain(|_, record| record.is_live(now));
        before - guard.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn session_cookie(token: Uuid, lifetime: ChronoDuration) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::seconds(lifetime.num_seconds()));
    cookie
}

fn token_from(jar: &CookieJar) -> Option<Uuid> {
    let cookie = jar.get(SESSION_COOKIE)?;
    Uuid::parse_str(cookie.value()).ok()
}
