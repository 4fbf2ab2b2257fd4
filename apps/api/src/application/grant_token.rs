//! LiveKit-compatible room access tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

/// Room capabilities carried by a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_publish_data: bool,
    pub can_subscribe: bool,
}

impl VideoGrant {
    /// Join one room, publish and subscribe. Nothing administrative.
    pub fn participant(room: &str) -> Self {
        Self {
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_publish_data: true,
            can_subscribe: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomGrantClaims {
    /// API key the token was signed for
    pub iss: String,
    /// Participant identity
    pub sub: String,
    pub name: String,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub video: VideoGrant,
}

pub struct IssuedGrant {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

pub fn issue_room_token(
    identity: &str,
    name: &str,
    video: VideoGrant,
    api_key: &str,
    api_secret: &SecretString,
    ttl: Duration,
) -> AppResult<IssuedGrant> {
    let now = OffsetDateTime::now_utc();
    let expires_at = now + ttl;
    let claims = RoomGrantClaims {
        iss: api_key.to_string(),
        sub: identity.to_string(),
        name: name.to_string(),
        nbf: now.unix_timestamp(),
        exp: expires_at.unix_timestamp(),
        jti: Uuid::new_v4().to_string(),
        video,
    };
    let header = Header::new(Algorithm::HS256);
    let token = encode(
        &header,
        &claims,
        &EncodingKey::from_secret(api_secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(IssuedGrant { token, expires_at })
}

pub fn verify_room_token(
    token: &str,
    api_key: &str,
    api_secret: &SecretString,
) -> AppResult<RoomGrantClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[api_key]);
    validation.validate_nbf = true;
    decode::<RoomGrantClaims>(
        token,
        &DecodingKey::from_secret(api_secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::InvalidInput(e.to_string()))
}
