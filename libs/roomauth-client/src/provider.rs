//! Identity provider sign-in flows: the out-of-band credential (popup) and
//! the redirect callback.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use roomauth_types::{IssuedTokens, User};
use url::Url;

use crate::error::ProviderError;

/// Credential handed back by the identity provider's client library.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential {
    provider: String,
    token: String,
}

impl ProviderCredential {
    pub fn new(provider: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            token: token.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("provider", &self.provider)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Runs the provider's out-of-band sign-in (popup, device flow, ...).
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn acquire(&self) -> Result<ProviderCredential, ProviderError>;
}

// ============================================================================
// Redirect callback
// ============================================================================

/// Profile details the provider may append to the redirect URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserHint {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl UserHint {
    fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none()
    }

    /// Build a user record from the hint. `fallback_id` is used when the
    /// redirect carried no user id.
    pub fn into_user(self, fallback_id: Option<&str>) -> Option<User> {
        if self.is_empty() {
            return None;
        }
        let id = self.id.or_else(|| fallback_id.map(str::to_string))?;
        let email = self.email.unwrap_or_default();
        let display_name = self.name.unwrap_or_else(|| email.clone());
        let now = Utc::now();

        Some(User {
            id,
            email,
            display_name,
            first_name: None,
            last_name: None,
            avatar_url: self.image,
            google_id: None,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_provisional: false,
        })
    }
}

/// Query parameters of the provider's redirect back to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectCallback {
    pub success: Option<String>,
    pub error: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<String>,
    pub user: UserHint,
}

/// What a redirect callback amounts to.
#[derive(Debug)]
pub enum CallbackOutcome {
    Tokens {
        tokens: IssuedTokens,
        hint: Option<UserHint>,
    },
    Failed(String),
}

impl RedirectCallback {
    pub fn from_url(url: &Url) -> Self {
        let mut callback = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = Some(value.to_string());
            match key.as_ref() {
                "success" => callback.success = value,
                "error" => callback.error = value,
                "access_token" => callback.access_token = value,
                "refresh_token" => callback.refresh_token = value,
                "token_type" => callback.token_type = value,
                "expires_in" => callback.expires_in = value,
                "user_id" => callback.user.id = value,
                "user_email" => callback.user.email = value,
                "user_name" => callback.user.name = value,
                "user_image" => callback.user.image = value,
                _ => {}
            }
        }
        callback
    }

    pub fn outcome(self) -> CallbackOutcome {
        if let Some(error) = self.error {
            return CallbackOutcome::Failed(error);
        }

        let succeeded = self.success.as_deref() == Some("true");
        match (succeeded, self.access_token, self.refresh_token) {
            (true, Some(access_token), Some(refresh_token)) => {
                let tokens = IssuedTokens {
                    access_token,
                    refresh_token,
                    expires_in: self.expires_in.and_then(|s| s.parse().ok()),
                    user: None,
                };
                let hint = (!self.user.is_empty()).then_some(self.user);
                CallbackOutcome::Tokens { tokens, hint }
            }
            _ => CallbackOutcome::Failed(
                "authentication completed but no success indicators were received".into(),
            ),
        }
    }
}
