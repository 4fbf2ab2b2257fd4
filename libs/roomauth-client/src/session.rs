//! The auth session state machine.
//!
//! [`SessionManager`] is the only writer of the [`Session`]. Sign-in,
//! sign-out, refresh and guest entry are serialized behind one lock; startup
//! restoration runs its network calls outside the lock and commits only if no
//! user action started in the meantime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use roomauth_types::{IssuedTokens, TokenPair, User};
use secrecy::SecretString;
use strum::Display;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::instrument;
use url::Url;

use crate::backend::{AuthBackend, HttpAuthBackend};
use crate::claims;
use crate::config::SessionConfig;
use crate::error::{ConfigError, SessionError};
use crate::http_client::try_build_client_for;
use crate::profile::{HttpProfileClient, UserResolver, parse_profile};
use crate::provider::{CallbackOutcome, CredentialSource, RedirectCallback, UserHint};
use crate::store::{FileTokenStore, TokenStore};
use crate::transport::{AuthorizedClient, Reauthenticator, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Loading,
    Guest,
    Authenticated,
    /// Transient. A failure publishes it and immediately settles in a safe
    /// status that keeps the error, so watchers that lag only see the settled
    /// snapshot. Check [`Session::error`] rather than matching on this.
    Error,
}

/// Snapshot of the client's session.
///
/// `Authenticated` always carries a user and `Guest` never does; the
/// constructors are private so no other state can be built.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    status: SessionStatus,
    user: Option<User>,
    error: Option<SessionError>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            user: None,
            error: None,
        }
    }
}

impl Session {
    fn loading(user: Option<User>) -> Self {
        Self {
            status: SessionStatus::Loading,
            user,
            error: None,
        }
    }

    fn guest() -> Self {
        Self {
            status: SessionStatus::Guest,
            user: None,
            error: None,
        }
    }

    fn authenticated(user: User) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(user),
            error: None,
        }
    }

    fn failed(error: SessionError) -> Self {
        Self {
            status: SessionStatus::Error,
            user: None,
            error: Some(error),
        }
    }

    /// Safe state after a failure, still showing the message.
    fn recovered(status: SessionStatus, error: SessionError) -> Self {
        Self {
            status,
            user: None,
            error: Some(error),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_guest(&self) -> bool {
        self.status == SessionStatus::Guest
    }
}

/// Outcome of restoring a persisted session at startup.
enum Restore {
    /// Nothing persisted
    Empty,
    /// Stored tokens still work; `tokens` is set when they were rotated
    Restored {
        tokens: Option<TokenPair>,
        user: User,
    },
    /// Stored credentials are unusable
    Discard,
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    resolver: UserResolver,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
    op_lock: Mutex<()>,
    /// Bumped by every user action; startup restoration commits only if it
    /// still sees the value it started with.
    epoch: AtomicU64,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        resolver: UserResolver,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            backend,
            resolver,
            store,
            state,
            op_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// HTTP-backed manager with a file token store at `config.storage_path`.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let http_client = try_build_client_for(config)
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        let backend = HttpAuthBackend::new(http_client.clone(), config)
            .map_err(|e| ConfigError::Invalid(format!("invalid endpoint: {e}")))?;
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.storage_path));
        let profiles = Arc::new(HttpProfileClient::new(http_client, config.clone()));
        let resolver = UserResolver::from_config(profiles, store.clone(), config);

        Ok(Self::new(Arc::new(backend), resolver, store))
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.store.get().await.map(|pair| pair.access_token)
    }

    /// Wrap `transport` so requests carry this session's access token and
    /// refresh it once on 401.
    pub fn authorized_client(self: &Arc<Self>, transport: Arc<dyn Transport>) -> AuthorizedClient {
        AuthorizedClient::new(transport, self.clone())
    }

    /// Restore a persisted session. Makes at most two network calls and
    /// never leaves the session `Loading`.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let ticket = self.epoch.load(Ordering::SeqCst);
        if self.state.borrow().status != SessionStatus::Uninitialized {
            tracing::debug!("Session already initialized");
            return;
        }
        self.publish_if_current(ticket, Session::loading(None));

        let outcome = self.restore().await;

        let _guard = self.op_lock.lock().await;
        if self.epoch.load(Ordering::SeqCst) != ticket {
            tracing::info!("Session restore superseded by a user action, discarding result");
            return;
        }

        match outcome {
            Restore::Empty => {
                self.publish(Session::default());
            }
            Restore::Restored { tokens, user } => {
                let saved = match &tokens {
                    Some(pair) => self.store.save_session(pair, &user).await,
                    None => self.store.save_user(&user).await,
                };
                if let Err(e) = saved {
                    tracing::warn!(error = %e, "Failed to persist restored session");
                }
                tracing::info!(user_id = %user.id, "Session restored");
                self.publish(Session::authenticated(user));
            }
            Restore::Discard => {
                self.clear_local().await;
                self.publish(Session::default());
            }
        }
    }

    async fn restore(&self) -> Restore {
        let pair = self.store.get().await;
        let cached = self.store.cached_user().await;

        let (pair, cached) = match (pair, cached) {
            (Some(pair), Some(user)) => (pair, user),
            (None, None) => return Restore::Empty,
            _ => {
                tracing::debug!("Incomplete persisted session, discarding");
                return Restore::Discard;
            }
        };

        let expired = claims::decode(&pair.access_token)
            .map(|c| c.is_expired(Utc::now()))
            .unwrap_or(false);

        if expired {
            tracing::debug!("Stored access token past its expiry, going straight to refresh");
        } else {
            match self.resolver.current_user(&pair.access_token).await {
                Ok(user) => {
                    return Restore::Restored { tokens: None, user };
                }
                Err(e) => tracing::debug!(error = %e, "Stored access token not accepted"),
            }
        }

        match self.backend.refresh(&pair.refresh_token).await {
            Ok(issued) => {
                let tokens = issued.token_pair(Utc::now());
                if !tokens.is_well_formed() {
                    tracing::warn!("Refresh returned an incomplete token pair");
                    return Restore::Discard;
                }
                let user = user_from_response(&issued, &tokens.access_token).unwrap_or(cached);
                Restore::Restored {
                    tokens: Some(tokens),
                    user,
                }
            }
            Err(e) => {
                tracing::info!(error = %e, "Stored session could not be refreshed");
                Restore::Discard
            }
        }
    }

    /// Sign in through the identity provider's out-of-band flow.
    #[instrument(skip_all)]
    pub async fn sign_in_with_provider(
        &self,
        source: &dyn CredentialSource,
    ) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        let fallback = self.fallback_status();
        self.begin_sign_in().await;

        let result: Result<User, SessionError> = async {
            let credential = source.acquire().await?;
            let issued = self
                .backend
                .exchange(&credential)
                .await
                .map_err(|e| SessionError::VerificationFailed(e.to_string()))?;
            self.establish(issued, None).await
        }
        .await;

        self.finish(result, fallback).await
    }

    /// Complete the provider's redirect flow from the callback URL.
    #[instrument(skip_all)]
    pub async fn complete_redirect(&self, callback_url: &Url) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        let fallback = self.fallback_status();
        self.begin_sign_in().await;

        let result = match RedirectCallback::from_url(callback_url).outcome() {
            CallbackOutcome::Tokens { tokens, hint } => self.establish(tokens, hint).await,
            CallbackOutcome::Failed(message) => Err(SessionError::VerificationFailed(message)),
        };

        self.finish(result, fallback).await
    }

    /// Sign in with an email and password.
    #[instrument(skip_all)]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        let fallback = self.fallback_status();
        self.begin_sign_in().await;

        let result = match self.backend.login(email, password).await {
            Ok(issued) => self.establish(issued, None).await,
            Err(e) => Err(SessionError::VerificationFailed(e.to_string())),
        };

        self.finish(result, fallback).await
    }

    /// Create an account and sign straight into it.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        let fallback = self.fallback_status();
        self.begin_sign_in().await;

        let result = match self.backend.register(email, password, name).await {
            Ok(issued) => self.establish(issued, None).await,
            Err(e) => Err(SessionError::VerificationFailed(e.to_string())),
        };

        self.finish(result, fallback).await
    }

    /// Enter guest mode. No network call; any stored credentials are dropped.
    #[instrument(skip(self))]
    pub async fn sign_in_as_guest(&self) {
        let _guard = self.begin_operation().await;
        self.clear_local().await;
        self.publish(Session::guest());
        tracing::info!("Entered guest session");
    }

    /// Best-effort server-side revocation, then unconditional local clearing.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        let _guard = self.begin_operation().await;

        if let Some(pair) = self.store.get().await {
            if let Err(e) = self.backend.revoke(&pair.access_token).await {
                tracing::warn!(error = %e, "Server-side sign-out failed, clearing locally");
            }
        }

        self.clear_local().await;
        self.publish(Session::default());
        tracing::info!("Signed out");
    }

    /// Exchange the stored refresh token for a new pair. Failure signs out
    /// locally and is never retried.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), SessionError> {
        let current = self.session();
        if current.status == SessionStatus::Guest {
            tracing::debug!("Guest session has nothing to refresh");
            return Ok(());
        }

        let Some(pair) = self.store.get().await else {
            let error = SessionError::RefreshFailed("no refresh token stored".into());
            self.fail(error.clone(), SessionStatus::Uninitialized).await;
            return Err(error);
        };

        self.publish(Session::loading(current.user));

        let result: Result<User, SessionError> = async {
            let issued = self
                .backend
                .refresh(&pair.refresh_token)
                .await
                .map_err(|e| SessionError::RefreshFailed(e.to_string()))?;
            let tokens = issued.token_pair(Utc::now());
            if !tokens.is_well_formed() {
                return Err(SessionError::RefreshFailed(
                    "refresh returned an incomplete token pair".into(),
                ));
            }

            let user = match user_from_response(&issued, &tokens.access_token) {
                Some(user) => user,
                None => {
                    self.resolver
                        .resolve(&tokens.access_token)
                        .await
                        .map_err(|e| SessionError::RefreshFailed(e.to_string()))?
                        .user
                }
            };

            self.store.save_session(&tokens, &user).await?;
            Ok(user)
        }
        .await;

        match result {
            Ok(user) => {
                tracing::debug!("Session refreshed");
                self.publish(Session::authenticated(user));
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone(), SessionStatus::Uninitialized).await;
                Err(e)
            }
        }
    }

    /// Fetch the canonical profile again and replace the user with it.
    /// Failure clears local credentials and ends `Uninitialized`.
    #[instrument(skip(self))]
    pub async fn reload_user(&self) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        if self.state.borrow().status != SessionStatus::Authenticated {
            tracing::debug!("No authenticated user to reload");
            return Ok(());
        }

        let result: Result<User, SessionError> = async {
            let pair = self.store.get().await.ok_or_else(|| {
                SessionError::ProfileFetchFailed("no access token stored".into())
            })?;
            let user = self.resolver.current_user(&pair.access_token).await?;
            self.store.save_user(&user).await?;
            Ok(user)
        }
        .await;

        match result {
            Ok(user) => {
                tracing::debug!(user_id = %user.id, "User reloaded");
                self.publish(Session::authenticated(user));
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone(), SessionStatus::Uninitialized).await;
                Err(e)
            }
        }
    }

    /// Drop the surfaced error message. Status is left alone unless the
    /// session is still showing `Error`.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|session| {
            if session.error.is_none() {
                return false;
            }
            session.error = None;
            if session.status == SessionStatus::Error {
                session.status = SessionStatus::Uninitialized;
            }
            true
        });
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn begin_operation(&self) -> MutexGuard<'_, ()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.op_lock.lock().await
    }

    /// Where a failed sign-in lands: guests stay guests.
    fn fallback_status(&self) -> SessionStatus {
        match self.state.borrow().status {
            SessionStatus::Guest => SessionStatus::Guest,
            _ => SessionStatus::Uninitialized,
        }
    }

    /// A new identity replaces whatever was stored before.
    async fn begin_sign_in(&self) {
        self.clear_local().await;
        self.publish(Session::loading(None));
    }

    /// Persist the issued pair together with the resolved user.
    async fn establish(
        &self,
        issued: IssuedTokens,
        hint: Option<UserHint>,
    ) -> Result<User, SessionError> {
        let tokens = issued.token_pair(Utc::now());
        if !tokens.is_well_formed() {
            return Err(SessionError::VerificationFailed(
                "identity provider returned an incomplete token pair".into(),
            ));
        }

        let user = match user_from_response(&issued, &tokens.access_token) {
            Some(user) => user,
            None => {
                let resolved = self
                    .resolver
                    .resolve_with_hint(&tokens.access_token, hint)
                    .await?;
                tracing::debug!(source = ?resolved.source, "User resolved");
                resolved.user
            }
        };

        self.store.save_session(&tokens, &user).await?;
        Ok(user)
    }

    async fn finish(
        &self,
        result: Result<User, SessionError>,
        fallback: SessionStatus,
    ) -> Result<(), SessionError> {
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Signed in");
                self.publish(Session::authenticated(user));
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone(), fallback).await;
                Err(e)
            }
        }
    }

    /// Surface `error`, drop local credentials and settle in `settle`.
    async fn fail(&self, error: SessionError, settle: SessionStatus) {
        tracing::warn!(code = %error.code(), error = %error, "Session operation failed");
        self.clear_local().await;
        self.publish(Session::failed(error.clone()));
        self.publish(Session::recovered(settle, error));
    }

    async fn clear_local(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::error!(error = %e, "Failed to clear stored session");
        }
    }

    fn publish(&self, session: Session) {
        self.state.send_replace(session);
    }

    fn publish_if_current(&self, ticket: u64, session: Session) {
        self.state.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *current = session;
            true
        });
    }
}

#[async_trait]
impl Reauthenticator for SessionManager {
    async fn current_access_token(&self) -> Option<String> {
        self.access_token().await
    }

    async fn reauthenticate(&self, rejected_token: &str) -> Result<(), SessionError> {
        let _guard = self.begin_operation().await;
        if self
            .store
            .get()
            .await
            .is_some_and(|pair| pair.access_token != rejected_token)
        {
            tracing::debug!("Session already refreshed by another request");
            return Ok(());
        }
        self.refresh_locked().await
    }
}

/// User profile embedded in a token response, if it is a recognizable one.
fn user_from_response(issued: &IssuedTokens, access_token: &str) -> Option<User> {
    let body = issued.user.as_ref()?;
    let subject = claims::decode(access_token)
        .ok()
        .and_then(|c| c.subject().map(str::to_string));
    parse_profile(body, subject.as_deref()).map(|(_, user)| user)
}
