use rand::RngCore;
use roomauth_types::{ConnectionDetails, ConnectionDetailsRequest, GrantUser};
use secrecy::SecretString;
use time::{Duration, OffsetDateTime};
use tracing::instrument;

use crate::app_error::{AppError, AppResult};
use crate::grant_token::{VideoGrant, issue_room_token};

pub const GUEST_PARTICIPANT_NAME: &str = "Guest User";
pub const GUEST_IDENTITY_PREFIX: &str = "voice_assistant_user";
pub const ROOM_NAME_PREFIX: &str = "voice_assistant_room";

/// Who is asking for a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityContext {
    Authenticated {
        email: String,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Guest,
}

impl IdentityContext {
    /// Only a non-guest request with a non-empty email counts as
    /// authenticated; everything else is a guest.
    pub fn from_request(request: &ConnectionDetailsRequest) -> Self {
        if request.is_guest {
            return IdentityContext::Guest;
        }
        match &request.user {
            Some(user) => Self::from_user(user),
            None => IdentityContext::Guest,
        }
    }

    fn from_user(user: &GrantUser) -> Self {
        let email = user.email.trim();
        if email.is_empty() {
            return IdentityContext::Guest;
        }
        IdentityContext::Authenticated {
            email: email.to_string(),
            first_name: non_blank(user.first_name.as_deref()),
            last_name: non_blank(user.last_name.as_deref()),
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, IdentityContext::Guest)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Per-call options. A requested validity can only shorten the configured one.
#[derive(Debug, Clone, Default)]
pub struct RoomRequest {
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RoomGrant {
    pub server_url: String,
    pub room_name: String,
    pub participant_name: String,
    pub participant_identity: String,
    pub participant_token: String,
    pub expires_at: OffsetDateTime,
}

impl From<RoomGrant> for ConnectionDetails {
    fn from(grant: RoomGrant) -> Self {
        ConnectionDetails {
            server_url: grant.server_url,
            room_name: grant.room_name,
            participant_name: grant.participant_name,
            participant_identity: grant.participant_identity,
            participant_token: grant.participant_token,
        }
    }
}

/// Gateway URL and signing credentials. Any of them may be missing at
/// startup; minting then fails with a configuration error.
#[derive(Clone)]
pub struct GrantSettings {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<SecretString>,
    pub ttl: Duration,
}

pub struct RoomGrantUseCases {
    settings: GrantSettings,
}

impl RoomGrantUseCases {
    pub fn new(settings: GrantSettings) -> Self {
        Self { settings }
    }

    #[instrument(skip_all, fields(guest = context.is_guest()))]
    pub fn mint(&self, context: &IdentityContext, request: &RoomRequest) -> AppResult<RoomGrant> {
        let server_url = self
            .settings
            .server_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("LIVEKIT_URL is not configured".into()))?;
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("LIVEKIT_API_KEY is not configured".into()))?;
        let api_secret = self.settings.api_secret.as_ref().ok_or_else(|| {
            AppError::Configuration("LIVEKIT_API_SECRET is not configured".into())
        })?;

        let (participant_identity, participant_name) = match context {
            IdentityContext::Authenticated {
                email,
                first_name,
                last_name,
            } => {
                let name = match (first_name, last_name) {
                    (Some(first), Some(last)) => format!("{first} {last}"),
                    _ => email.clone(),
                };
                (email.clone(), name)
            }
            IdentityContext::Guest => (
                random_name(GUEST_IDENTITY_PREFIX),
                GUEST_PARTICIPANT_NAME.to_string(),
            ),
        };

        // Never derived from the identity: other participants see room names.
        let room_name = random_name(ROOM_NAME_PREFIX);
        let ttl = self.effective_ttl(request);

        let issued = issue_room_token(
            &participant_identity,
            &participant_name,
            VideoGrant::participant(&room_name),
            api_key,
            api_secret,
            ttl,
        )?;

        tracing::info!(
            room = %room_name,
            ttl_secs = ttl.whole_seconds(),
            "Room grant minted"
        );

        Ok(RoomGrant {
            server_url: server_url.to_string(),
            room_name,
            participant_name,
            participant_identity,
            participant_token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    fn effective_ttl(&self, request: &RoomRequest) -> Duration {
        match request.ttl {
            Some(ttl) if ttl.is_positive() => ttl.min(self.settings.ttl),
            _ => self.settings.ttl,
        }
    }
}

/// `<prefix>_<16 hex chars>`, 64 random bits.
fn random_name(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant_token::verify_room_token;
    use crate::test_utils::{
        TEST_API_KEY, TEST_LIVEKIT_URL, create_test_grant_user, test_api_secret,
        test_grant_settings,
    };

    fn use_cases() -> RoomGrantUseCases {
        RoomGrantUseCases::new(test_grant_settings())
    }

    fn authenticated(user: GrantUser) -> IdentityContext {
        IdentityContext::from_request(&ConnectionDetailsRequest::authenticated(user))
    }

    fn is_random_name(value: &str, prefix: &str) -> bool {
        value
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|hex| hex.len() == 16 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    }

    #[test]
    fn test_authenticated_user_with_names() {
        let user = create_test_grant_user(|u| {
            u.email = "a@b.com".into();
            u.first_name = Some("A".into());
            u.last_name = Some("B".into());
        });

        let grant = use_cases()
            .mint(&authenticated(user), &RoomRequest::default())
            .unwrap();

        assert_eq!(grant.participant_identity, "a@b.com");
        assert_eq!(grant.participant_name, "A B");
        assert_eq!(grant.server_url, TEST_LIVEKIT_URL);
        assert!(is_random_name(&grant.room_name, ROOM_NAME_PREFIX));
    }

    #[test]
    fn test_authenticated_user_without_names_uses_email() {
        let user = create_test_grant_user(|u| {
            u.email = "jane@x.com".into();
            u.first_name = None;
            u.last_name = None;
        });

        let grant = use_cases()
            .mint(&authenticated(user), &RoomRequest::default())
            .unwrap();

        assert_eq!(grant.participant_identity, "jane@x.com");
        assert_eq!(grant.participant_name, "jane@x.com");
    }

    #[test]
    fn test_only_first_name_falls_back_to_email() {
        let user = create_test_grant_user(|u| {
            u.email = "jane@x.com".into();
            u.first_name = Some("Jane".into());
            u.last_name = Some("  ".into());
        });

        let grant = use_cases()
            .mint(&authenticated(user), &RoomRequest::default())
            .unwrap();
        assert_eq!(grant.participant_name, "jane@x.com");
    }

    #[test]
    fn test_guest_identities_are_random_and_not_reused() {
        let guest = IdentityContext::from_request(&ConnectionDetailsRequest::guest());
        let use_cases = use_cases();

        let first = use_cases.mint(&guest, &RoomRequest::default()).unwrap();
        let second = use_cases.mint(&guest, &RoomRequest::default()).unwrap();

        assert_eq!(first.participant_name, GUEST_PARTICIPANT_NAME);
        assert!(is_random_name(&first.participant_identity, GUEST_IDENTITY_PREFIX));
        assert!(is_random_name(&second.participant_identity, GUEST_IDENTITY_PREFIX));
        assert_ne!(first.participant_identity, second.participant_identity);
        assert_ne!(first.room_name, second.room_name);
    }

    #[test]
    fn test_guest_flag_wins_over_user() {
        let request = ConnectionDetailsRequest {
            user: Some(create_test_grant_user(|_| {})),
            is_guest: true,
        };
        assert_eq!(IdentityContext::from_request(&request), IdentityContext::Guest);
    }

    #[test]
    fn test_blank_email_is_guest() {
        let user = create_test_grant_user(|u| u.email = "   ".into());
        assert!(authenticated(user).is_guest());
    }

    #[test]
    fn test_room_name_never_contains_identity() {
        let user = create_test_grant_user(|u| u.email = "leak@example.com".into());
        let grant = use_cases()
            .mint(&authenticated(user), &RoomRequest::default())
            .unwrap();
        assert!(!grant.room_name.contains("leak"));
    }

    #[test]
    fn test_token_carries_minimal_capabilities() {
        let guest = IdentityContext::Guest;
        let grant = use_cases().mint(&guest, &RoomRequest::default()).unwrap();

        let claims =
            verify_room_token(&grant.participant_token, TEST_API_KEY, &test_api_secret()).unwrap();

        assert_eq!(claims.sub, grant.participant_identity);
        assert_eq!(claims.video, VideoGrant::participant(&grant.room_name));
        assert_eq!(claims.exp - claims.nbf, 15 * 60);
        assert_eq!(grant.expires_at.unix_timestamp(), claims.exp);
    }

    #[test]
    fn test_requested_ttl_only_shortens() {
        let use_cases = use_cases();
        let guest = IdentityContext::Guest;

        let shorter = use_cases
            .mint(&guest, &RoomRequest { ttl: Some(Duration::minutes(2)) })
            .unwrap();
        let longer = use_cases
            .mint(&guest, &RoomRequest { ttl: Some(Duration::hours(5)) })
            .unwrap();

        let claims = |token: &str| verify_room_token(token, TEST_API_KEY, &test_api_secret()).unwrap();
        let short_claims = claims(&shorter.participant_token);
        let long_claims = claims(&longer.participant_token);
        assert_eq!(short_claims.exp - short_claims.nbf, 2 * 60);
        assert_eq!(long_claims.exp - long_claims.nbf, 15 * 60);
    }

    #[test]
    fn test_missing_credentials_are_configuration_errors() {
        let mut settings = test_grant_settings();
        settings.api_secret = None;
        let result = RoomGrantUseCases::new(settings).mint(&IdentityContext::Guest, &RoomRequest::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let mut settings = test_grant_settings();
        settings.server_url = None;
        let result = RoomGrantUseCases::new(settings).mint(&IdentityContext::Guest, &RoomRequest::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let mut settings = test_grant_settings();
        settings.api_key = None;
        let result = RoomGrantUseCases::new(settings).mint(&IdentityContext::Guest, &RoomRequest::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
