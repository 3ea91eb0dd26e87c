//! Session management: login, the session cookie, and re-authentication.
//!
//! The [`SessionManager`] is the only owner of the session cookie. Callers
//! never see the token; they ask the manager to [`attach`](SessionManager::attach)
//! the session to an outgoing request.
//!
//! Logins are single-flight. A login gate serializes every login attempt, and
//! callers that queued behind an attempt observe its outcome (the new token,
//! or the same error) instead of issuing a login of their own.

use crate::config::ConnectionConfig;
use crate::error::reason_phrase;
use crate::{Error, Result};
use http::header::{HeaderName, HeaderValue, COOKIE};
use http::StatusCode;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use url::Url;

/// Name of the session cookie issued by the sign-in endpoint.
pub const SESSION_COOKIE_NAME: &str = "LWSSO_COOKIE_KEY";

/// Header identifying the calling client to the server.
pub const CLIENT_TYPE_HEADER: &str = "HPECLIENTTYPE";

fn client_type_header() -> HeaderName {
    HeaderName::from_static("hpeclienttype")
}

#[derive(Clone, PartialEq, Eq)]
struct SessionToken {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
}

struct HeldToken {
    /// Number of the login attempt that produced the token
    epoch: u64,
    token: SessionToken,
}

/// Outcome of a failed login, shared with every caller waiting on it.
#[derive(Clone)]
enum LoginFailure {
    Rejected {
        message: String,
        status: Option<StatusCode>,
    },
    Transport(Arc<reqwest::Error>),
    Disposed,
}

impl From<LoginFailure> for Error {
    fn from(failure: LoginFailure) -> Self {
        match failure {
            LoginFailure::Rejected { message, status } => {
                Error::AuthenticationFailed { message, status }
            }
            LoginFailure::Transport(e) => Error::LoginFailed(e),
            LoginFailure::Disposed => Error::IllegalArgument("Client has been disposed".to_string()),
        }
    }
}

#[derive(Default)]
struct LoginState {
    last_failure: Option<LoginFailure>,
}

#[derive(Serialize)]
struct SignIn<'a> {
    user: &'a str,
    password: &'a str,
}

/// Owns the session cookie and the login state machine.
pub struct SessionManager {
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    sign_in_url: Url,
    client_type: HeaderValue,
    username: String,
    password: String,
    token: RwLock<Option<HeldToken>>,
    gate: Mutex<LoginState>,
    login_attempts: AtomicU64,
}

impl SessionManager {
    pub(crate) fn new(
        http: reqwest::Client,
        permits: Arc<Semaphore>,
        sign_in_url: Url,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let client_type = HeaderValue::from_str(config.client_type()).map_err(|e| {
            Error::IllegalArgument(format!("Invalid client type header value: {}", e))
        })?;

        Ok(Self {
            http,
            permits,
            sign_in_url,
            client_type,
            username: config.username().unwrap_or_default().to_string(),
            password: config.password().unwrap_or_default().to_string(),
            token: RwLock::new(None),
            gate: Mutex::new(LoginState::default()),
            login_attempts: AtomicU64::new(0),
        })
    }

    /// Returns `true` if a session token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Makes sure a session exists, logging in if none is held.
    ///
    /// Concurrent callers share a single login: whoever arrives while a login
    /// is in flight waits for it and gets its result.
    pub async fn ensure_session(&self) -> Result<()> {
        let seen = self.login_attempts.load(Ordering::Acquire);
        if self.is_authenticated() {
            return Ok(());
        }

        let mut state = self.gate.lock().await;
        if self.is_authenticated() {
            return Ok(());
        }
        if let Some(failure) = self.failure_since(seen, &state) {
            return Err(failure.into());
        }
        self.login_locked(&mut state).await
    }

    /// Logs in unconditionally, replacing any held token.
    ///
    /// # Errors
    ///
    /// [`Error::AuthenticationFailed`] when the server rejects the credentials
    /// or answers without a session cookie, [`Error::LoginFailed`] when the
    /// sign-in request does not complete.
    pub async fn login(&self) -> Result<()> {
        let mut state = self.gate.lock().await;
        self.login_locked(&mut state).await
    }

    /// Drops the held token. The next request logs in again.
    pub fn invalidate(&self) {
        if self.token.write().take().is_some() {
            tracing::debug!("Session invalidated");
        }
    }

    /// Adds the client type header and the session cookie to a request.
    ///
    /// Returns the epoch of the attached session, or `None` if no session is
    /// held (the request then goes out without a cookie).
    pub fn attach(&self, request: &mut reqwest::Request) -> Option<u64> {
        let headers = request.headers_mut();
        headers.insert(client_type_header(), self.client_type.clone());

        let held = self.token.read();
        let held = held.as_ref()?;
        let cookie = format!("{}={}", held.token.name, held.token.value);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
                Some(held.epoch)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session cookie is not a valid header value");
                None
            }
        }
    }

    /// Replaces a session the server rejected.
    ///
    /// If another caller already replaced the `stale` session the fresh one is
    /// reused; if another caller's login failed meanwhile, its error is
    /// returned.
    pub(crate) async fn relogin(&self, stale: Option<u64>) -> Result<()> {
        let seen = self.login_attempts.load(Ordering::Acquire);
        let mut state = self.gate.lock().await;

        let current = self.token.read().as_ref().map(|held| held.epoch);
        if current.is_some() && current != stale {
            tracing::debug!("Session already refreshed by another request");
            return Ok(());
        }
        if let Some(failure) = self.failure_since(seen, &state) {
            return Err(failure.into());
        }

        self.invalidate();
        self.login_locked(&mut state).await
    }

    /// The failure of a login that finished after `seen` was observed.
    fn failure_since(&self, seen: u64, state: &LoginState) -> Option<LoginFailure> {
        if self.login_attempts.load(Ordering::Acquire) == seen {
            return None;
        }
        state.last_failure.clone()
    }

    async fn login_locked(&self, state: &mut LoginState) -> Result<()> {
        let outcome = self.authenticate().await;
        let epoch = self.login_attempts.fetch_add(1, Ordering::AcqRel) + 1;

        match outcome {
            Ok(token) => {
                tracing::info!(
                    epoch = epoch,
                    domain = ?token.domain,
                    path = ?token.path,
                    "Logged in"
                );
                *self.token.write() = Some(HeldToken { epoch, token });
                state.last_failure = None;
                Ok(())
            }
            Err(failure) => {
                *self.token.write() = None;
                state.last_failure = Some(failure.clone());
                let error = Error::from(failure);
                tracing::warn!(error = %error, epoch = epoch, "Login failed");
                Err(error)
            }
        }
    }

    async fn authenticate(&self) -> std::result::Result<SessionToken, LoginFailure> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LoginFailure::Disposed)?;

        tracing::debug!(url = %self.sign_in_url, "Signing in");

        let response = self
            .http
            .post(self.sign_in_url.clone())
            .header(client_type_header(), self.client_type.clone())
            .json(&SignIn {
                user: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| LoginFailure::Transport(Arc::new(e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LoginFailure::Rejected {
                message: format!("code={}; reason={}", status.as_u16(), reason_phrase(&response)),
                status: Some(status),
            });
        }

        let token = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
            .map(|cookie| SessionToken {
                name: cookie.name().to_string(),
                value: cookie.value().to_string(),
                domain: cookie.domain().map(str::to_string),
                path: cookie.path().map(str::to_string),
            });

        token.ok_or_else(|| LoginFailure::Rejected {
            message: "status code was OK, but no security token found".to_string(),
            status: Some(status),
        })
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sign_in_url", &self.sign_in_url.as_str())
            .field("authenticated", &self.is_authenticated())
            .field("login_attempts", &self.login_attempts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
