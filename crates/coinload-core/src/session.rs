// crates/coinload-core/src/session.rs
// ============================================================================
// Module: Session Cache
// Description: Per-username auth token cache backed by the login endpoint.
// Purpose: Avoid redundant logins while tolerating concurrent first logins.
// Dependencies: serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`SessionCache::get_token`] returns a cached token when one exists and is
//! still within the optional TTL; otherwise it logs in via `POST /auth` and
//! caches the result. Concurrent first logins for the same user may both hit
//! the API; the map still holds a single entry per username (last writer
//! wins). The mutex is never held across an await point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

use crate::credentials::UserCredential;
use crate::executor::HttpRequest;
use crate::executor::NetworkError;
use crate::executor::RequestExecutor;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Cached authentication for one user.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Username the token belongs to.
    pub username: String,
    /// Opaque bearer token.
    pub token: String,
    /// When the token was obtained.
    pub obtained_at: Instant,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Token handed to the scenario runner.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Opaque bearer token.
    pub value: String,
    /// True when this call performed a login.
    pub fresh: bool,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken").field("value", &"<redacted>").field("fresh", &self.fresh).finish()
    }
}

/// Login failures.
///
/// # Invariants
/// - A failed login never creates a cache entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The login endpoint answered with a non-200 status.
    #[error("login failed with status {status}")]
    LoginFailed {
        /// Status returned by the login endpoint.
        status: u16,
    },
    /// The login endpoint answered 200 without a usable token.
    #[error("login response did not contain a token")]
    MissingToken,
    /// The login request failed at the transport level.
    #[error("login request failed: {0}")]
    Network(#[from] NetworkError),
}

impl AuthError {
    /// Returns a stable label for event logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LoginFailed {
                ..
            } => "login_failed",
            Self::MissingToken => "missing_token",
            Self::Network(err) => err.kind(),
        }
    }

    /// Returns the status code when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::LoginFailed {
                status,
            } => Some(*status),
            Self::MissingToken => Some(200),
            Self::Network(_) => None,
        }
    }
}

/// Login request body.
#[derive(Serialize)]
struct LoginRequest<'a> {
    /// Login name.
    username: &'a str,
    /// Login password.
    password: &'a str,
}

/// Login response body.
#[derive(Deserialize)]
struct LoginResponse {
    /// Issued token, when present.
    #[serde(default)]
    token: Option<String>,
}

// ============================================================================
// SECTION: Session Cache
// ============================================================================

/// Shared username-to-token cache.
///
/// # Invariants
/// - At most one [`Session`] per username.
/// - Entries are replaced only by a newer successful login or removed by
///   [`SessionCache::invalidate_token`] with the token they hold.
pub struct SessionCache {
    /// Executor used for login calls.
    executor: Arc<dyn RequestExecutor>,
    /// Login endpoint.
    auth_url: Url,
    /// Deadline for login calls.
    timeout: Duration,
    /// Optional maximum session age.
    ttl: Option<Duration>,
    /// Cached sessions keyed by username.
    sessions: Mutex<HashMap<String, Session>>,
    /// Login calls issued so far.
    login_attempts: AtomicU64,
}

impl SessionCache {
    /// Creates an empty cache that logs in via `auth_url`.
    #[must_use]
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        auth_url: Url,
        timeout: Duration,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            auth_url,
            timeout,
            ttl,
            sessions: Mutex::new(HashMap::new()),
            login_attempts: AtomicU64::new(0),
        }
    }

    /// Returns a token for `user`, logging in when nothing valid is cached.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the login call fails; nothing is cached.
    pub async fn get_token(&self, user: &UserCredential) -> Result<SessionToken, AuthError> {
        if let Some(token) = self.cached_token(&user.username) {
            return Ok(SessionToken {
                value: token,
                fresh: false,
            });
        }
        let token = self.login(user).await?;
        let session = Session {
            username: user.username.clone(),
            token: token.clone(),
            obtained_at: Instant::now(),
        };
        self.lock().insert(user.username.clone(), session);
        Ok(SessionToken {
            value: token,
            fresh: true,
        })
    }

    /// Returns the cached token for `username` if present and unexpired.
    #[must_use]
    pub fn cached_token(&self, username: &str) -> Option<String> {
        let sessions = self.lock();
        let session = sessions.get(username)?;
        if let Some(ttl) = self.ttl
            && session.obtained_at.elapsed() >= ttl
        {
            return None;
        }
        Some(session.token.clone())
    }

    /// Drops the cached session for `username` only if it still holds
    /// `token`. Returns true when a session was removed.
    ///
    /// A rejected token that was already replaced by a newer login leaves
    /// the newer session in place.
    pub fn invalidate_token(&self, username: &str, token: &str) -> bool {
        let mut sessions = self.lock();
        if sessions.get(username).is_some_and(|session| session.token == token) {
            sessions.remove(username);
            return true;
        }
        false
    }

    /// Returns the number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no sessions are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the number of login calls issued.
    #[must_use]
    pub fn login_attempts(&self) -> u64 {
        self.login_attempts.load(Ordering::Relaxed)
    }

    /// Calls the login endpoint for `user`.
    async fn login(&self, user: &UserCredential) -> Result<String, AuthError> {
        let body = LoginRequest {
            username: &user.username,
            password: &user.password,
        };
        let request = HttpRequest::post_json(self.auth_url.clone(), &body)?.with_timeout(self.timeout);
        self.login_attempts.fetch_add(1, Ordering::Relaxed);
        let response = self.executor.execute(request).await?;
        if response.status != 200 {
            return Err(AuthError::LoginFailed {
                status: response.status,
            });
        }
        let parsed: LoginResponse =
            serde_json::from_slice(&response.body).map_err(|_| AuthError::MissingToken)?;
        match parsed.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::MissingToken),
        }
    }

    /// Locks the session map, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
