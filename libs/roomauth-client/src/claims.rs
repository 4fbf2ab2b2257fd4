//! Unverified claims extraction.
//!
//! Nothing here checks a signature. The output is only good for display
//! fallbacks and advisory expiry hints; it must never decide access.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ClaimsError;

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub exp: Option<i64>,

    /// Provider-specific claims (email, name, picture, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Tokens without an `exp` claim are never considered expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }
}

/// Split a `header.payload.signature` token and parse its payload.
pub fn decode(token: &str) -> Result<Claims, ClaimsError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimsError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    };

    if payload.is_empty() {
        return Err(ClaimsError::MalformedToken("empty payload segment".into()));
    }

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| ClaimsError::MalformedToken(format!("payload is not base64: {e}")))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ClaimsError::MalformedToken(format!("payload is not JSON: {e}")))?;

    if !value.is_object() {
        return Err(ClaimsError::MalformedToken(
            "payload is not a JSON object".into(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| ClaimsError::MalformedToken(format!("unexpected claim types: {e}")))
}
