//! Outbound HTTP with bearer credentials and a one-shot refresh on 401.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{SessionError, TransportError};

/// A request that can be sent more than once.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json<T: Serialize>(url: Url, body: &T) -> Result<Self, TransportError> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let mut request = Self::new(Method::POST, url);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Some(bytes);
        Ok(request)
    }

    /// Copy of this request carrying `token` as its bearer credential.
    fn with_bearer(&self, token: &str) -> Result<Self, TransportError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| TransportError::InvalidRequest("access token is not a valid header".into()))?;
        value.set_sensitive(true);

        let mut request = self.clone();
        request.headers.insert(AUTHORIZATION, value);
        Ok(request)
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Plain reqwest transport. Non-2xx statuses are returned, not raised.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// The session side of the interceptor.
#[async_trait]
pub trait Reauthenticator: Send + Sync {
    async fn current_access_token(&self) -> Option<String>;

    /// Refresh after `rejected_token` was refused. Does nothing when the
    /// session has already moved past that token.
    async fn reauthenticate(&self, rejected_token: &str) -> Result<(), SessionError>;
}

/// Attaches the stored access token to every request and, on the first 401
/// for a request, refreshes once and replays it.
pub struct AuthorizedClient {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn Reauthenticator>,
}

impl AuthorizedClient {
    pub fn new(transport: Arc<dyn Transport>, auth: Arc<dyn Reauthenticator>) -> Self {
        Self { transport, auth }
    }

    async fn dispatch(
        &self,
        request: &OutboundRequest,
        token: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        match token {
            Some(token) => self.transport.send(&request.with_bearer(token)?).await,
            None => self.transport.send(request).await,
        }
    }
}

#[async_trait]
impl Transport for AuthorizedClient {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut token = self.auth.current_access_token().await;
        let mut retried = false;

        loop {
            let response = self.dispatch(request, token.as_deref()).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if retried {
                tracing::warn!(url = %request.url, "Replayed request rejected again");
                return Err(TransportError::Unauthorized);
            }
            let Some(sent) = token.take() else {
                return Err(TransportError::Unauthorized);
            };
            retried = true;

            let current = self.auth.current_access_token().await;
            if current.as_deref().is_some_and(|c| c != sent) {
                tracing::debug!(url = %request.url, "Access token rotated meanwhile, replaying");
                token = current;
                continue;
            }

            if let Err(e) = self.auth.reauthenticate(&sent).await {
                tracing::warn!(url = %request.url, error = %e, "Refresh after 401 failed");
                return Err(TransportError::Unauthorized);
            }

            token = self.auth.current_access_token().await;
            if token.is_none() {
                return Err(TransportError::Unauthorized);
            }
        }
    }
}
