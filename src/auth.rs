//! Hosted auth provider interface.
//!
//! The dashboard never stores credentials itself; it exchanges email-link codes and
//! passwords for sessions at a hosted auth service and resolves bearer tokens to users.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::AuthConfig;

pub const DEFAULT_NEXT: &str = "/dashboard";
pub const LOGIN_PATH: &str = "/login";
pub const CALLBACK_PATH: &str = "/auth/callback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: SessionUser,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired code")]
    InvalidCode,

    #[error("invalid or expired session")]
    InvalidToken,

    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth service error ({status}): {body}")]
    Upstream { status: u16, body: String },
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    /// Ask the provider to email a sign-in link that lands on `redirect_to`.
    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;
    async fn user_for_token(&self, token: &str) -> Result<SessionUser, AuthError>;
}

pub type DynAuthProvider = Arc<dyn AuthProvider>;

/// HTTP provider when a URL is configured, otherwise an empty in-memory provider.
pub fn build_auth_provider(cfg: &AuthConfig) -> DynAuthProvider {
    match cfg.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Arc::new(HttpAuthProvider::new(url, cfg.api_key.clone())),
        None => {
            warn!(target: "auth", "no auth URL configured, using in-memory provider");
            Arc::new(MemoryAuth::new())
        }
    }
}

/// Only same-site relative paths are accepted as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => DEFAULT_NEXT,
    }
}

/// Configured site URL, else derived from the request Host.
pub fn base_url(site_url: Option<&str>, host: Option<&str>) -> String {
    if let Some(s) = site_url.filter(|s| !s.is_empty()) {
        return s.trim_end_matches('/').to_string();
    }
    match host {
        Some(h) if h.starts_with("localhost") || h.starts_with("127.0.0.1") => format!("http://{h}"),
        Some(h) => format!("https://{h}"),
        None => String::new(),
    }
}

// ------------------------------------------------------------
// HTTP provider (GoTrue-style endpoints)
// ------------------------------------------------------------

pub struct HttpAuthProvider {
    http: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct TokenReply {
    access_token: String,
    user: SessionUser,
}

impl HttpAuthProvider {
    pub fn new(base: &str, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let rb = self.http.request(method, format!("{}{}", self.base, path));
        match &self.api_key {
            Some(k) => rb.header("apikey", k),
            None => rb,
        }
    }

    async fn token(&self, grant: &str, body: serde_json::Value, rejected: AuthError) -> Result<Session, AuthError> {
        let rsp = self
            .request(reqwest::Method::POST, "/auth/v1/token")
            .query(&[("grant_type", grant)])
            .json(&body)
            .send()
            .await?;
        let status = rsp.status();
        if status.is_client_error() {
            return Err(rejected);
        }
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(AuthError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let t: TokenReply = rsp.json().await?;
        Ok(Session {
            access_token: t.access_token,
            user: t.user,
        })
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        self.token("pkce", json!({ "auth_code": code }), AuthError::InvalidCode)
            .await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.token(
            "password",
            json!({ "email": email, "password": password }),
            AuthError::InvalidCredentials,
        )
        .await
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let rsp = self
            .request(reqwest::Method::POST, "/auth/v1/otp")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(AuthError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn user_for_token(&self, token: &str) -> Result<SessionUser, AuthError> {
        let rsp = self
            .request(reqwest::Method::GET, "/auth/v1/user")
            .bearer_auth(token)
            .send()
            .await?;
        let status = rsp.status();
        if status.is_client_error() {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(AuthError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(rsp.json().await?)
    }
}

// ------------------------------------------------------------
// In-memory provider (local runs, tests)
// ------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    /// email → (password, user)
    users: HashMap<String, (Option<String>, SessionUser)>,
    codes: HashMap<String, SessionUser>,
    sessions: HashMap<String, SessionUser>,
    sent_links: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MemoryAuth {
    state: RwLock<MemoryState>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single map insert or removal, so a poisoned guard still
    // holds consistent state.
    fn write_state(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, email: &str, password: &str) -> SessionUser {
        let user = SessionUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        self.write_state()
            .users
            .insert(email.to_string(), (Some(password.to_string()), user.clone()));
        user
    }

    /// One-time code as delivered by an email link.
    pub fn issue_code(&self, email: &str) -> Option<String> {
        let mut st = self.write_state();
        let user = st.users.get(email)?.1.clone();
        let code = uuid::Uuid::new_v4().simple().to_string();
        st.codes.insert(code.clone(), user);
        Some(code)
    }

    /// Session token for an existing user, bypassing credentials.
    pub fn issue_token(&self, email: &str) -> Option<String> {
        let mut st = self.write_state();
        let user = st.users.get(email)?.1.clone();
        Some(open_session(&mut st, user).access_token)
    }

    /// (email, redirect_to) pairs of every link "sent" so far.
    pub fn sent_links(&self) -> Vec<(String, String)> {
        self.read_state().sent_links.clone()
    }
}

fn open_session(st: &mut MemoryState, user: SessionUser) -> Session {
    let token = uuid::Uuid::new_v4().simple().to_string();
    st.sessions.insert(token.clone(), user.clone());
    Session {
        access_token: token,
        user,
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let mut st = self.write_state();
        let user = st.codes.remove(code).ok_or(AuthError::InvalidCode)?;
        Ok(open_session(&mut st, user))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut st = self.write_state();
        let user = match st.users.get(email) {
            Some((Some(pw), user)) if pw == password => user.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        Ok(open_session(&mut st, user))
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let mut st = self.write_state();
        st.users.entry(email.to_string()).or_insert_with(|| {
            (
                None,
                SessionUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    email: Some(email.to_string()),
                },
            )
        });
        st.sent_links
            .push((email.to_string(), redirect_to.to_string()));
        info!(target: "auth", "magic link queued");
        Ok(())
    }

    async fn user_for_token(&self, token: &str) -> Result<SessionUser, AuthError> {
        let st = self.read_state();
        st.sessions.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_a_relative_path() {
        assert_eq!(safe_next(None), "/dashboard");
        assert_eq!(safe_next(Some("/articles")), "/articles");
        assert_eq!(safe_next(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("")), "/dashboard");
    }

    #[test]
    fn base_url_prefers_site_url() {
        assert_eq!(
            base_url(Some("https://desk.example.com/"), Some("ignored")),
            "https://desk.example.com"
        );
        assert_eq!(base_url(None, Some("localhost:3000")), "http://localhost:3000");
        assert_eq!(base_url(None, Some("desk.example.com")), "https://desk.example.com");
    }

    #[tokio::test]
    async fn memory_auth_round_trip() {
        let auth = MemoryAuth::new();
        let user = auth.add_user("a@example.com", "pw");

        assert!(matches!(
            auth.sign_in_with_password("a@example.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        let s = auth.sign_in_with_password("a@example.com", "pw").await.unwrap();
        assert_eq!(auth.user_for_token(&s.access_token).await.unwrap(), user);

        let code = auth.issue_code("a@example.com").unwrap();
        assert!(auth.exchange_code(&code).await.is_ok());
        // Codes are single-use.
        assert!(matches!(
            auth.exchange_code(&code).await,
            Err(AuthError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn magic_link_is_recorded() {
        let auth = MemoryAuth::new();
        auth.send_magic_link("b@example.com", "http://x/auth/callback?next=/dashboard")
            .await
            .unwrap();
        assert_eq!(auth.sent_links().len(), 1);
        assert!(auth.issue_code("b@example.com").is_some());
    }

    #[tokio::test]
    async fn users_added_after_a_panicking_writer_can_sign_in() {
        let auth = Arc::new(MemoryAuth::new());
        let held = auth.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.state.write().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(auth.state.is_poisoned());

        let user = auth.add_user("late@example.com", "pw");
        let session = auth
            .sign_in_with_password("late@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(session.user, user);
        assert_eq!(auth.user_for_token(&session.access_token).await.unwrap(), user);
        assert!(auth.issue_token("late@example.com").is_some());
    }
}
