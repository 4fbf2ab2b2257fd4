//! Identity provider token endpoints.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use roomauth_types::{AuthResponse, IssuedTokens};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;

use crate::config::SessionConfig;
use crate::error::BackendError;
use crate::provider::ProviderCredential;

/// Token exchange, refresh and revocation against the identity provider.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange a provider credential for a token pair.
    async fn exchange(&self, credential: &ProviderCredential) -> Result<IssuedTokens, BackendError>;
    async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<IssuedTokens, BackendError>;
    /// Create an account and sign it in.
    async fn register(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<IssuedTokens, BackendError>;
    async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, BackendError>;
    /// Best-effort server-side sign-out.
    async fn revoke(&self, access_token: &str) -> Result<(), BackendError>;
}

pub struct HttpAuthBackend {
    http_client: Client,
    verify_url: Url,
    login_url: Url,
    register_url: Url,
    refresh_url: Url,
    logout_url: Url,
}

impl HttpAuthBackend {
    pub fn new(http_client: Client, config: &SessionConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            http_client,
            verify_url: config.endpoint(&config.provider_verify_path)?,
            login_url: config.endpoint(&config.login_path)?,
            register_url: config.endpoint(&config.register_path)?,
            refresh_url: config.endpoint(&config.refresh_path)?,
            logout_url: config.endpoint(&config.logout_path)?,
        })
    }

    async fn post_for_tokens(
        &self,
        url: &Url,
        body: serde_json::Value,
    ) -> Result<IssuedTokens, BackendError> {
        let response = self.http_client.post(url.clone()).json(&body).send().await?;
        let response = check_status(response).await?;

        let parsed: AuthResponse = response.json().await?;
        parsed.into_tokens().ok_or_else(|| {
            BackendError::InvalidResponse("token endpoint reported failure".into())
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn exchange(&self, credential: &ProviderCredential) -> Result<IssuedTokens, BackendError> {
        self.post_for_tokens(
            &self.verify_url,
            json!({ "google_token": credential.token() }),
        )
        .await
    }

    async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<IssuedTokens, BackendError> {
        self.post_for_tokens(
            &self.login_url,
            json!({ "email": email, "password": password.expose_secret() }),
        )
        .await
    }

    async fn register(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<IssuedTokens, BackendError> {
        self.post_for_tokens(
            &self.register_url,
            json!({ "email": email, "password": password.expose_secret(), "name": name }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, BackendError> {
        self.post_for_tokens(&self.refresh_url, json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn revoke(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .http_client
            .post(self.logout_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Map non-success statuses onto `BackendError`, keeping the server's
/// `detail`/`message` when it sent one.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body
        .get("detail")
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP error {status}"));

    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}
