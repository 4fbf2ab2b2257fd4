use std::net::SocketAddr;

use anyhow::Context;
use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;
use time::Duration;
use url::Url;

use crate::use_cases::room_grant::GrantSettings;

pub const DEFAULT_GRANT_TTL_SECS: i64 = 15 * 60;

/// Grants are short-lived; a longer configured validity is cut to this.
pub const MAX_GRANT_TTL_SECS: i64 = 60 * 60;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    /// Media gateway URL handed to participants. Kept as given, not normalized.
    pub livekit_url: Option<String>,
    pub livekit_api_key: Option<String>,
    pub livekit_api_secret: Option<SecretString>,
    pub grant_ttl: Duration,
}

impl AppConfig {
    /// Gateway URL and signing credentials are optional here: the service
    /// starts without them and every mint call reports a configuration error.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 3001)),
        );
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .context("CORS_ORIGIN must be a valid header value")?;

        let livekit_url = optional_env("LIVEKIT_URL");
        if let Some(url) = &livekit_url {
            Url::parse(url).context("LIVEKIT_URL must be a valid URL")?;
        }
        let livekit_api_key = optional_env("LIVEKIT_API_KEY");
        let livekit_api_secret = optional_env("LIVEKIT_API_SECRET")
            .map(|secret| SecretString::new(secret.into()));

        let grant_ttl_secs: i64 = get_env_default("GRANT_TTL_SECS", DEFAULT_GRANT_TTL_SECS);

        Ok(Self {
            bind_addr,
            cors_origin,
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            grant_ttl: clamp_grant_ttl(grant_ttl_secs),
        })
    }

    pub fn minting_configured(&self) -> bool {
        self.livekit_url.is_some()
            && self.livekit_api_key.is_some()
            && self.livekit_api_secret.is_some()
    }

    pub fn grant_settings(&self) -> GrantSettings {
        GrantSettings {
            server_url: self.livekit_url.clone(),
            api_key: self.livekit_api_key.clone(),
            api_secret: self.livekit_api_secret.clone(),
            ttl: self.grant_ttl,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn clamp_grant_ttl(secs: i64) -> Duration {
    if secs <= 0 {
        return Duration::seconds(DEFAULT_GRANT_TTL_SECS);
    }
    Duration::seconds(secs.min(MAX_GRANT_TTL_SECS))
}
