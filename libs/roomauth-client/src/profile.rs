//! User resolution: canonical profile, alternative paths, cached record,
//! then a provisional record synthesized from token claims.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use roomauth_types::User;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::backend::check_status;
use crate::claims;
use crate::config::SessionConfig;
use crate::error::{BackendError, SessionError};
use crate::provider::UserHint;
use crate::store::TokenStore;

/// Bearer-authenticated GET against the profile store.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    async fn fetch(&self, path: &str, access_token: &str) -> Result<Value, BackendError>;
}

pub struct HttpProfileClient {
    http_client: Client,
    config: SessionConfig,
}

impl HttpProfileClient {
    pub fn new(http_client: Client, config: SessionConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl ProfileClient for HttpProfileClient {
    async fn fetch(&self, path: &str, access_token: &str) -> Result<Value, BackendError> {
        let url = self
            .config
            .endpoint(path)
            .map_err(|e| BackendError::InvalidResponse(format!("invalid profile path: {e}")))?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

// ============================================================================
// Response parsers
// ============================================================================

/// Shapes the profile store is known to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileShape {
    /// `{ "success": true, "data": { ...user } }`
    Envelope,
    /// A bare user object with at least an email or a name
    Bare,
}

/// Result of one parser attempt.
#[derive(Debug)]
pub enum ParseAttempt {
    Parsed(User),
    Rejected(&'static str),
}

type ProfileParser = fn(&Value, Option<&str>) -> ParseAttempt;

const PROFILE_PARSERS: [(ProfileShape, ProfileParser); 2] = [
    (ProfileShape::Envelope, parse_envelope),
    (ProfileShape::Bare, parse_bare),
];

/// Try every known response shape in order; first success wins.
pub fn parse_profile(body: &Value, subject: Option<&str>) -> Option<(ProfileShape, User)> {
    for (shape, parser) in PROFILE_PARSERS {
        match parser(body, subject) {
            ParseAttempt::Parsed(user) => return Some((shape, user)),
            ParseAttempt::Rejected(reason) => {
                tracing::trace!(?shape, reason, "Profile shape did not match");
            }
        }
    }
    None
}

fn parse_envelope(body: &Value, _subject: Option<&str>) -> ParseAttempt {
    let Some(obj) = body.as_object() else {
        return ParseAttempt::Rejected("not an object");
    };
    if obj.get("success").and_then(Value::as_bool) != Some(true) {
        return ParseAttempt::Rejected("no successful envelope");
    }
    let Some(data) = obj.get("data").and_then(Value::as_object) else {
        return ParseAttempt::Rejected("envelope without data object");
    };
    // Envelope data is taken as-is: no identifier borrowed from the token.
    user_from_fields(data, None)
}

fn parse_bare(body: &Value, subject: Option<&str>) -> ParseAttempt {
    let Some(obj) = body.as_object() else {
        return ParseAttempt::Rejected("not an object");
    };
    if obj.contains_key("success") && obj.contains_key("data") {
        return ParseAttempt::Rejected("envelope is not a bare user");
    }
    user_from_fields(obj, subject)
}

fn user_from_fields(obj: &Map<String, Value>, fallback_id: Option<&str>) -> ParseAttempt {
    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => match fallback_id {
            Some(sub) => sub.to_string(),
            None => return ParseAttempt::Rejected("missing identifier"),
        },
    };

    let email = str_field(obj, &["email"]);
    let first_name = str_field(obj, &["firstName", "first_name"]);
    let last_name = str_field(obj, &["lastName", "last_name"]);
    let name = str_field(obj, &["displayName", "display_name", "name"]);
    let now = Utc::now();

    let mut user = User {
        id,
        email: email.unwrap_or_default(),
        display_name: name.unwrap_or_default(),
        first_name,
        last_name,
        avatar_url: str_field(
            obj,
            &["avatarUrl", "avatar_url", "profilePictureUrl", "image", "picture"],
        ),
        google_id: str_field(obj, &["googleId", "google_id"]),
        is_active: bool_field(obj, &["isActive", "is_active"]).unwrap_or(true),
        is_verified: bool_field(obj, &["isVerified", "is_verified"]).unwrap_or(false),
        created_at: time_field(obj, &["createdAt", "created_at"]).unwrap_or(now),
        updated_at: time_field(obj, &["updatedAt", "updated_at"]).unwrap_or(now),
        last_login: time_field(obj, &["lastLogin", "last_login", "last_login_at"]),
        is_provisional: false,
    };

    if user.display_name.is_empty() {
        user.display_name = user.full_name().unwrap_or_else(|| user.email.clone());
    }
    if user.display_name.is_empty() {
        return ParseAttempt::Rejected("neither email nor name");
    }
    ParseAttempt::Parsed(user)
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn bool_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_bool))
}

fn time_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find_map(parse_timestamp)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Some backends omit the offset; those timestamps are UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Minimal provisional user derived from a token subject.
///
/// The display placeholder comes from a hash of the subject so the raw
/// identifier does not end up in names other participants can see.
pub fn synthesize_user(subject: &str) -> User {
    let digest = hex::encode(Sha256::digest(subject.as_bytes()));
    let short = &digest[..8];
    let now = Utc::now();

    User {
        id: subject.to_string(),
        email: String::new(),
        display_name: format!("User {short}"),
        first_name: None,
        last_name: None,
        avatar_url: None,
        google_id: None,
        is_active: true,
        is_verified: false,
        created_at: now,
        updated_at: now,
        last_login: None,
        is_provisional: true,
    }
}

// ============================================================================
// UserResolver
// ============================================================================

/// Where a resolved user came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveSource {
    Canonical,
    Candidate(String),
    Cached,
    Hint,
    Synthesized,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub user: User,
    pub source: ResolveSource,
}

pub struct UserResolver {
    client: Arc<dyn ProfileClient>,
    store: Arc<dyn TokenStore>,
    canonical_path: String,
    candidate_paths: Vec<String>,
}

impl UserResolver {
    pub fn new(
        client: Arc<dyn ProfileClient>,
        store: Arc<dyn TokenStore>,
        canonical_path: impl Into<String>,
        candidate_paths: Vec<String>,
    ) -> Self {
        Self {
            client,
            store,
            canonical_path: canonical_path.into(),
            candidate_paths,
        }
    }

    pub fn from_config(
        client: Arc<dyn ProfileClient>,
        store: Arc<dyn TokenStore>,
        config: &SessionConfig,
    ) -> Self {
        Self::new(
            client,
            store,
            config.canonical_profile_path.clone(),
            config.candidate_profile_paths.clone(),
        )
    }

    /// Canonical profile only: a single request, no fallbacks.
    #[instrument(skip_all)]
    pub async fn current_user(&self, access_token: &str) -> Result<User, SessionError> {
        let subject = subject_of(access_token);
        self.fetch_path(&self.canonical_path, access_token, subject.as_deref())
            .await
            .ok_or_else(|| {
                SessionError::ProfileFetchFailed("canonical profile unavailable".into())
            })
    }

    pub async fn resolve(&self, access_token: &str) -> Result<Resolved, SessionError> {
        self.resolve_with_hint(access_token, None).await
    }

    /// Full fallback chain. Paths are tried strictly one after another and
    /// the first structurally valid answer ends the search.
    #[instrument(skip_all)]
    pub async fn resolve_with_hint(
        &self,
        access_token: &str,
        hint: Option<UserHint>,
    ) -> Result<Resolved, SessionError> {
        let subject = subject_of(access_token);

        if let Some(user) = self
            .fetch_path(&self.canonical_path, access_token, subject.as_deref())
            .await
        {
            return Ok(Resolved {
                user,
                source: ResolveSource::Canonical,
            });
        }

        for path in &self.candidate_paths {
            if let Some(user) = self.fetch_path(path, access_token, subject.as_deref()).await {
                tracing::info!(path = %path, "Resolved user from alternative profile path");
                return Ok(Resolved {
                    user,
                    source: ResolveSource::Candidate(path.clone()),
                });
            }
        }

        if let Some(user) = self.store.cached_user().await {
            tracing::info!("Profile store unavailable, using cached user");
            return Ok(Resolved {
                user,
                source: ResolveSource::Cached,
            });
        }

        if let Some(user) = hint.and_then(|h| h.into_user(subject.as_deref())) {
            return Ok(Resolved {
                user,
                source: ResolveSource::Hint,
            });
        }

        match subject {
            Some(subject) => {
                tracing::warn!("No profile available, synthesizing provisional user from claims");
                Ok(Resolved {
                    user: synthesize_user(&subject),
                    source: ResolveSource::Synthesized,
                })
            }
            None => Err(SessionError::ProfileFetchFailed(
                "no profile source succeeded and the token carries no subject".into(),
            )),
        }
    }

    async fn fetch_path(
        &self,
        path: &str,
        access_token: &str,
        subject: Option<&str>,
    ) -> Option<User> {
        match self.client.fetch(path, access_token).await {
            Ok(body) => match parse_profile(&body, subject) {
                Some((shape, user)) => {
                    tracing::debug!(path = %path, ?shape, "Profile fetched");
                    Some(user)
                }
                None => {
                    tracing::warn!(path = %path, "Profile response was not a recognizable user");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Profile fetch failed");
                None
            }
        }
    }
}

fn subject_of(access_token: &str) -> Option<String> {
    match claims::decode(access_token) {
        Ok(claims) => claims.subject().map(str::to_string),
        Err(e) => {
            tracing::debug!(error = %e, "Access token claims unavailable");
            None
        }
    }
}
