use std::path::PathBuf;
use std::time::Duration;

use env_helpers::get_env_default;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CANONICAL_PROFILE_PATH: &str = "/api/v1/users/me";

/// Alternative profile paths, tried in this order after the canonical one.
pub const DEFAULT_CANDIDATE_PROFILE_PATHS: [&str; 4] = [
    "/api/v1/user",
    "/api/v1/profile",
    "/api/v1/auth/profile",
    "/api/v1/auth/user",
];

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Profile probing and token exchange are expected to answer quickly; a
/// timeout counts as a failed attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the session client.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the identity provider and profile store API
    pub api_base_url: Url,

    pub canonical_profile_path: String,

    pub candidate_profile_paths: Vec<String>,

    /// Exchanges a provider credential for a token pair
    pub provider_verify_path: String,

    /// Email and password sign-in
    pub login_path: String,

    pub register_path: String,

    pub refresh_path: String,

    pub logout_path: String,

    pub connect_timeout: Duration,

    pub request_timeout: Duration,

    /// Where the file-backed token store keeps the persisted session
    pub storage_path: PathBuf,

    /// Grant minting endpoint
    pub connection_details_url: Url,
}

impl SessionConfig {
    pub fn new(api_base_url: Url, connection_details_url: Url) -> Self {
        Self {
            api_base_url,
            canonical_profile_path: DEFAULT_CANONICAL_PROFILE_PATH.to_string(),
            candidate_profile_paths: DEFAULT_CANDIDATE_PROFILE_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            provider_verify_path: "/api/v1/auth/google/verify".to_string(),
            login_path: "/api/v1/auth/login".to_string(),
            register_path: "/api/v1/auth/register".to_string(),
            refresh_path: "/api/v1/auth/refresh".to_string(),
            logout_path: "/api/v1/auth/logout".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage_path: PathBuf::from(".roomauth/session.json"),
            connection_details_url,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url: String =
            get_env_default("ROOMAUTH_API_BASE_URL", "http://localhost:8000".to_string());
        let connection_details_url: String = get_env_default(
            "ROOMAUTH_CONNECTION_DETAILS_URL",
            "http://localhost:3001/api/connection-details".to_string(),
        );

        let mut config = Self::new(
            parse_url("ROOMAUTH_API_BASE_URL", &api_base_url)?,
            parse_url("ROOMAUTH_CONNECTION_DETAILS_URL", &connection_details_url)?,
        );

        config.canonical_profile_path =
            get_env_default("ROOMAUTH_PROFILE_PATH", config.canonical_profile_path);

        let candidates: String = get_env_default(
            "ROOMAUTH_PROFILE_CANDIDATES",
            config.candidate_profile_paths.join(","),
        );
        config.candidate_profile_paths = candidates
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        let request_timeout_ms: u64 = get_env_default("ROOMAUTH_REQUEST_TIMEOUT_MS", 10_000);
        config.request_timeout = Duration::from_millis(request_timeout_ms);

        let storage_path: String = get_env_default(
            "ROOMAUTH_STORAGE_PATH",
            config.storage_path.display().to_string(),
        );
        config.storage_path = PathBuf::from(storage_path);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canonical_profile_path.is_empty() {
            return Err(ConfigError::Invalid(
                "canonical profile path is required".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolve a path against the API base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_base_url.join(path)
    }
}

fn parse_url(var: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid(format!("{var} is not a valid URL: {e}")))
}
