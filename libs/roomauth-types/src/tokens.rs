use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access and refresh token issued together.
///
/// The two values always belong to the same issuance; they are replaced
/// together and never independently.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Both halves must be non-empty for the pair to be usable.
    pub fn is_well_formed(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

// Tokens never show up in logs.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Tokens returned by a token exchange or refresh call.
///
/// Accepts both camelCase and snake_case field names.
#[derive(Clone, Deserialize)]
pub struct IssuedTokens {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,

    #[serde(rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: String,

    /// Access token lifetime in seconds
    #[serde(default, rename = "expiresIn", alias = "expires_in")]
    pub expires_in: Option<i64>,

    /// Profile returned alongside the tokens, if any. Left untyped because
    /// identity providers disagree on its shape.
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

impl IssuedTokens {
    pub fn token_pair(&self, now: DateTime<Utc>) -> TokenPair {
        let expires_at = self
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now + Duration::seconds(secs));
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
            .with_expiry(expires_at)
    }
}

impl fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user.is_some())
            .finish()
    }
}

/// Body of a successful token exchange or refresh.
///
/// Identity providers answer either with the tokens directly or wrapped in a
/// `{ success, data }` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AuthResponse {
    Envelope { success: bool, data: IssuedTokens },
    Direct(IssuedTokens),
}

impl AuthResponse {
    /// The issued tokens, or `None` when the envelope reports failure.
    pub fn into_tokens(self) -> Option<IssuedTokens> {
        match self {
            AuthResponse::Envelope { success: true, data } => Some(data),
            AuthResponse::Envelope { success: false, .. } => None,
            AuthResponse::Direct(tokens) => Some(tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_debug_redacts_tokens() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_token_pair_round_trip_preserves_bytes() {
        let pair = TokenPair::new("a.b.c", "r-1").with_expiry(Some(Utc::now()));
        let json = serde_json::to_string(&pair).unwrap();
        let parsed: TokenPair = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pair);
    }

    #[test]
    fn test_auth_response_direct_camel_case() {
        let body = r#"{"accessToken":"a","refreshToken":"r","user":{"id":"1"}}"#;
        let tokens = serde_json::from_str::<AuthResponse>(body)
            .unwrap()
            .into_tokens()
            .unwrap();
        assert_eq!(tokens.access_token, "a");
        assert_eq!(tokens.refresh_token, "r");
        assert!(tokens.user.is_some());
    }

    #[test]
    fn test_auth_response_envelope_snake_case() {
        let body = r#"{"success":true,"data":{"access_token":"a","refresh_token":"r","expires_in":900}}"#;
        let tokens = serde_json::from_str::<AuthResponse>(body)
            .unwrap()
            .into_tokens()
            .unwrap();
        assert_eq!(tokens.expires_in, Some(900));

        let now = Utc::now();
        let pair = tokens.token_pair(now);
        assert_eq!(pair.expires_at, Some(now + Duration::seconds(900)));
    }

    #[test]
    fn test_auth_response_unsuccessful_envelope() {
        let body = r#"{"success":false,"data":{"access_token":"a","refresh_token":"r"}}"#;
        let response = serde_json::from_str::<AuthResponse>(body).unwrap();
        assert!(response.into_tokens().is_none());
    }

    #[test]
    fn test_auth_response_rejects_missing_refresh_token() {
        let body = r#"{"accessToken":"a"}"#;
        assert!(serde_json::from_str::<AuthResponse>(body).is_err());
    }

    #[test]
    fn test_well_formed_requires_both_tokens() {
        assert!(TokenPair::new("a", "r").is_well_formed());
        assert!(!TokenPair::new("a", "").is_well_formed());
        assert!(!TokenPair::new(" ", "r").is_well_formed());
    }
}
