//! In-memory fakes for every seam of the session client.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION},
    routing::any,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeZone, Utc};
use roomauth_types::{IssuedTokens, User};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::Notify;
use url::Url;

use crate::backend::AuthBackend;
use crate::error::{BackendError, ProviderError, SessionError, TransportError};
use crate::profile::ProfileClient;
use crate::provider::{CredentialSource, ProviderCredential};
use crate::transport::{OutboundRequest, Reauthenticator, Transport, TransportResponse};

// ============================================================================
// Factories
// ============================================================================

/// Unsigned JWT-shaped token carrying `payload` as its claims.
pub fn make_token(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.signature")
}

pub fn sample_user() -> User {
    let created = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
    User {
        id: "user-1".to_string(),
        email: "jane@example.com".to_string(),
        display_name: "Jane Doe".to_string(),
        first_name: Some("Jane".to_string()),
        last_name: Some("Doe".to_string()),
        avatar_url: None,
        google_id: Some("google-1".to_string()),
        is_active: true,
        is_verified: true,
        created_at: created,
        updated_at: created,
        last_login: None,
        is_provisional: false,
    }
}

pub fn issued(access_token: &str, refresh_token: &str, user: Option<Value>) -> IssuedTokens {
    IssuedTokens {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_in: Some(3600),
        user,
    }
}

// ============================================================================
// ScriptedBackend
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Exchange(String),
    Login(String),
    Register(String),
    Refresh(String),
    Revoke(String),
}

/// Identity provider that answers from queued results.
///
/// Empty queues reject exchange, sign-in and refresh and accept revocation.
#[derive(Default)]
pub struct ScriptedBackend {
    exchange: Mutex<VecDeque<Result<IssuedTokens, BackendError>>>,
    login: Mutex<VecDeque<Result<IssuedTokens, BackendError>>>,
    register: Mutex<VecDeque<Result<IssuedTokens, BackendError>>>,
    refresh: Mutex<VecDeque<Result<IssuedTokens, BackendError>>>,
    revoke: Mutex<VecDeque<Result<(), BackendError>>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchange(self, result: Result<IssuedTokens, BackendError>) -> Self {
        self.exchange.lock().unwrap().push_back(result);
        self
    }

    pub fn with_login(self, result: Result<IssuedTokens, BackendError>) -> Self {
        self.login.lock().unwrap().push_back(result);
        self
    }

    pub fn with_register(self, result: Result<IssuedTokens, BackendError>) -> Self {
        self.register.lock().unwrap().push_back(result);
        self
    }

    pub fn with_refresh(self, result: Result<IssuedTokens, BackendError>) -> Self {
        self.refresh.lock().unwrap().push_back(result);
        self
    }

    pub fn with_revoke(self, result: Result<(), BackendError>) -> Self {
        self.revoke.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn exchange(&self, credential: &ProviderCredential) -> Result<IssuedTokens, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Exchange(credential.token().to_string()));
        self.exchange
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Rejected {
                status: 400,
                message: "invalid credential".into(),
            }))
    }

    async fn login(
        &self,
        email: &str,
        _password: &SecretString,
    ) -> Result<IssuedTokens, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Login(email.to_string()));
        self.login
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Unauthorized))
    }

    async fn register(
        &self,
        email: &str,
        _password: &SecretString,
        _name: &str,
    ) -> Result<IssuedTokens, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Register(email.to_string()));
        self.register
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Rejected {
                status: 409,
                message: "email already registered".into(),
            }))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Refresh(refresh_token.to_string()));
        self.refresh
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Unauthorized))
    }

    async fn revoke(&self, access_token: &str) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Revoke(access_token.to_string()));
        self.revoke.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

// ============================================================================
// ScriptedProfileClient
// ============================================================================

/// Profile store with one fixed answer per path; unknown paths are 404.
#[derive(Default)]
pub struct ScriptedProfileClient {
    responses: HashMap<String, Result<Value, BackendError>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl ScriptedProfileClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, path: &str, result: Result<Value, BackendError>) -> Self {
        self.responses.insert(path.to_string(), result);
        self
    }

    /// Hold the next fetch: `entered` is notified when it starts, and it
    /// answers only after `release` is notified.
    pub fn with_gate(self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        *self.gate.lock().unwrap() = Some((entered, release));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileClient for ScriptedProfileClient {
    async fn fetch(&self, path: &str, _access_token: &str) -> Result<Value, BackendError> {
        self.calls.lock().unwrap().push(path.to_string());

        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        self.responses
            .get(path)
            .cloned()
            .unwrap_or(Err(BackendError::NotFound))
    }
}

// ============================================================================
// ScriptedCredentialSource
// ============================================================================

pub struct ScriptedCredentialSource {
    result: Result<ProviderCredential, ProviderError>,
}

impl ScriptedCredentialSource {
    pub fn granting(token: &str) -> Self {
        Self {
            result: Ok(ProviderCredential::new("google", token)),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl CredentialSource for ScriptedCredentialSource {
    async fn acquire(&self) -> Result<ProviderCredential, ProviderError> {
        self.result.clone()
    }
}

// ============================================================================
// ScriptedTransport
// ============================================================================

/// Transport that answers from a queue and records what it was sent.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<TransportResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent_tokens(&self) -> Vec<Option<String>> {
        self.requests()
            .iter()
            .map(|r| r.bearer_token().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Network("no scripted response".into())))
    }
}

// ============================================================================
// FakeReauthenticator
// ============================================================================

/// Session stand-in: refresh swaps in `next_token`, or fails when there is
/// none.
pub struct FakeReauthenticator {
    token: Mutex<Option<String>>,
    next_token: Option<String>,
    reads: AtomicUsize,
    rotation: Mutex<Option<(usize, String)>>,
    refresh_calls: AtomicUsize,
}

impl FakeReauthenticator {
    pub fn new(token: Option<&str>, next_token: Option<&str>) -> Self {
        Self {
            token: Mutex::new(token.map(str::to_string)),
            next_token: next_token.map(str::to_string),
            reads: AtomicUsize::new(0),
            rotation: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(token: Option<&str>) -> Self {
        Self::new(token, None)
    }

    /// Simulate another request refreshing the session after `reads`
    /// token lookups.
    pub fn rotate_after_reads(&self, reads: usize, token: &str) {
        *self.rotation.lock().unwrap() = Some((reads, token.to_string()));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reauthenticator for FakeReauthenticator {
    async fn current_access_token(&self) -> Option<String> {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut rotation = self.rotation.lock().unwrap();
        if rotation.as_ref().is_some_and(|(after, _)| reads > *after) {
            if let Some((_, token)) = rotation.take() {
                *self.token.lock().unwrap() = Some(token);
            }
        }
        self.token.lock().unwrap().clone()
    }

    async fn reauthenticate(&self, _rejected_token: &str) -> Result<(), SessionError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match &self.next_token {
            Some(next) => {
                *self.token.lock().unwrap() = Some(next.clone());
                Ok(())
            }
            None => Err(SessionError::RefreshFailed("refresh token rejected".into())),
        }
    }
}

// ============================================================================
// Local HTTP server
// ============================================================================

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn_api(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Client for talking to [`spawn_api`] servers, ignoring proxy settings.
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    /// JSON body, `Null` when there was none
    pub body: Value,
}

/// Canned HTTP endpoints that remember every request they receive.
#[derive(Clone, Default)]
pub struct RecordingApi {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router answering any method on `path` with `status` and `body`.
    pub fn route(&self, path: &str, status: StatusCode, body: Value) -> Router {
        let requests = self.requests.clone();
        let handler = move |method: Method, uri: Uri, headers: HeaderMap, bytes: Bytes| {
            let requests = requests.clone();
            let body = body.clone();
            async move {
                requests.lock().unwrap().push(RecordedRequest {
                    method: method.to_string(),
                    path: uri.path().to_string(),
                    authorization: headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
                });
                (status, Json(body))
            }
        };
        Router::new().route(path, any(handler))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
