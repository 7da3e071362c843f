//! Supabase auth client and the owner identity that gates every sync.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::util::{compact_text, is_http_url, normalize_text_option, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const AUTH_EVENT_CAPACITY: usize = 16;

/// Authenticated user id scoping every remote record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authentication state transitions broadcast to interested parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStateChange {
    SignedIn(OwnerId),
    SignedOut,
}

/// Source of the current owner identity, consulted before every sync cycle.
pub trait OwnerProvider: Send + Sync {
    fn current_owner(&self) -> impl Future<Output = Option<OwnerId>> + Send;
}

/// Fixed, swappable owner. Used for tests and local tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticOwnerProvider {
    owner: Arc<RwLock<Option<OwnerId>>>,
}

impl StaticOwnerProvider {
    pub fn new(owner: Option<OwnerId>) -> Self {
        Self {
            owner: Arc::new(RwLock::new(owner)),
        }
    }

    pub fn set_owner(&self, owner: Option<OwnerId>) {
        if let Ok(mut guard) = self.owner.write() {
            *guard = owner;
        }
    }
}

impl OwnerProvider for StaticOwnerProvider {
    async fn current_owner(&self) -> Option<OwnerId> {
        self.owner.read().ok().and_then(|guard| guard.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    pub fn owner(&self) -> OwnerId {
        OwnerId::new(self.user.id.clone())
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Shared slot holding the active session, read by the REST store for its
/// bearer token and written by the owner provider.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionHandle {
    pub fn get(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set(&self, session: Option<AuthSession>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().map(|session| session.access_token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// GoTrue client for email/password accounts.
///
/// Every successful sign-in (password or sign-up) is persisted through `S`
/// and announced to subscribers as [`AuthStateChange::SignedIn`].
#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
    events: broadcast::Sender<AuthStateChange>,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Ok(Self {
            auth_url: normalize_auth_url(url.as_ref())?,
            anon_key,
            client: Client::builder().build()?,
            store,
            events,
        })
    }

    /// Receive `SignedIn`/`SignedOut` transitions caused by this client.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    /// Load the persisted session, refreshing it when it is about to expire.
    /// A session that cannot be refreshed is forgotten.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };
        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(error) => {
                tracing::warn!("Dropping stored session, refresh failed: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let credentials = Credentials::checked(email, password)?;
        let reply = self.post("signup", None, &credentials).await?;
        match reply.into_session()? {
            Some(session) => {
                self.signed_in(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let credentials = Credentials::checked(email, password)?;
        let session = self.token_grant("password", &credentials).await?;
        self.signed_in(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let session = self.token_grant("refresh_token", &body).await?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Revoke `access_token` and forget the stored session. A token the
    /// server already rejects still signs out locally.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            check_status(response).await.map_err(AuthError::Api)?;
        }

        self.store.clear_session()?;
        self.notify(AuthStateChange::SignedOut);
        Ok(())
    }

    fn signed_in(&self, session: &AuthSession) -> AuthResult<()> {
        self.store.save_session(session)?;
        self.notify(AuthStateChange::SignedIn(session.owner()));
        Ok(())
    }

    fn notify(&self, change: AuthStateChange) {
        // No subscribers is fine.
        let _ = self.events.send(change);
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.auth_url)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: &impl Serialize,
    ) -> AuthResult<AuthSession> {
        self.post("token", Some(grant_type), body)
            .await?
            .into_session()?
            .ok_or_else(|| AuthError::Api(format!("`{grant_type}` grant returned no session")))
    }

    /// Anonymous-key POST to a GoTrue endpoint.
    async fn post(
        &self,
        path: &str,
        grant_type: Option<&str>,
        body: &impl Serialize,
    ) -> AuthResult<TokenReply> {
        let mut request = self
            .client
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(body);
        if let Some(grant_type) = grant_type {
            request = request.query(&[("grant_type", grant_type)]);
        }
        let response = check_status(request.send().await?)
            .await
            .map_err(AuthError::Api)?;
        Ok(response.json().await?)
    }
}

/// Owner provider backed by the persisted Supabase session.
///
/// Restores (and refreshes when expired) the stored session on demand and
/// publishes it through a [`SessionHandle`] for the REST store.
#[derive(Clone)]
pub struct SessionOwnerProvider<S: SessionPersistence> {
    client: SupabaseAuthClient<S>,
    session: SessionHandle,
}

impl<S: SessionPersistence> SessionOwnerProvider<S> {
    pub const fn new(client: SupabaseAuthClient<S>, session: SessionHandle) -> Self {
        Self { client, session }
    }

    pub const fn session(&self) -> &SessionHandle {
        &self.session
    }
}

impl<S: SessionPersistence> OwnerProvider for SessionOwnerProvider<S> {
    async fn current_owner(&self) -> Option<OwnerId> {
        if let Some(session) = self.session.get().filter(|session| !session.is_expired()) {
            return Some(session.owner());
        }

        match self.client.restore_session().await {
            Ok(session) => {
                let owner = session.as_ref().map(AuthSession::owner);
                self.session.set(session);
                owner
            }
            Err(error) => {
                tracing::warn!("Could not restore auth session: {}", error);
                self.session.set(None);
                None
            }
        }
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let base = url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(base) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    let base = base.strip_suffix("/auth/v1").unwrap_or(base);
    Ok(format!("{base}/auth/v1"))
}

/// Both halves of the Supabase pair, or neither.
pub fn resolve_optional_supabase_config(
    url: Option<String>,
    anon_key: Option<String>,
) -> AuthResult<Option<(String, String)>> {
    match (normalize_text_option(url), normalize_text_option(anon_key)) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => Ok(Some((url, anon_key))),
        _ => Err(AuthError::NotConfigured),
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl<'a> Credentials<'a> {
    fn checked(email: &'a str, password: &'a str) -> AuthResult<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Api("Email is required".to_string()));
        }
        if password.trim().is_empty() {
            return Err(AuthError::Api("Password is required".to_string()));
        }
        Ok(Self { email, password })
    }
}

/// Body of `/token` and `/signup`. A sign-up awaiting email confirmation
/// carries no tokens.
#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<AuthUser>,
}

impl TokenReply {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        if self.access_token.is_none() && self.refresh_token.is_none() {
            return Ok(None);
        }
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|seconds| unix_timestamp_now().saturating_add(seconds))
        });

        match (self.access_token, self.refresh_token, expires_at, self.user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            _ => Err(AuthError::Api(
                "Auth response carried a partial session".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Render a Supabase error body (auth or REST) as `message (status)`.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    let code = status.as_u16();
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|body| {
            body.message
                .or(body.msg)
                .or(body.error_description)
                .or(body.error)
        })
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
        .or_else(|| Some(compact_text(body)).filter(|text| !text.is_empty()));

    match detail {
        Some(detail) => format!("{detail} ({code})"),
        None => format!("HTTP {code}"),
    }
}

/// Pass a 2xx response through; otherwise render its error body.
pub(crate) async fn check_status(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(parse_api_error(status, &body))
}
