//! Test app state builder for HTTP-level integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;

use crate::{
    adapters::http::app_state::AppState,
    infra::config::AppConfig,
    test_utils::{TEST_API_KEY, TEST_LIVEKIT_URL, test_api_secret, test_grant_settings},
    use_cases::room_grant::RoomGrantUseCases,
};

/// Builder for creating `AppState` with fixed test credentials.
///
/// # Example
///
/// ```ignore
/// let app_state = TestAppStateBuilder::new().without_credentials().build();
/// ```
pub struct TestAppStateBuilder {
    config: AppConfig,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        let settings = test_grant_settings();
        Self {
            config: AppConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                cors_origin: HeaderValue::from_static("http://localhost:3000"),
                livekit_url: Some(TEST_LIVEKIT_URL.to_string()),
                livekit_api_key: Some(TEST_API_KEY.to_string()),
                livekit_api_secret: Some(test_api_secret()),
                grant_ttl: settings.ttl,
            },
        }
    }

    /// Drop the API key and secret.
    pub fn without_credentials(mut self) -> Self {
        self.config.livekit_api_key = None;
        self.config.livekit_api_secret = None;
        self
    }

    pub fn with_livekit_url(mut self, url: Option<&str>) -> Self {
        self.config.livekit_url = url.map(str::to_string);
        self
    }

    pub fn build(self) -> AppState {
        let room_grant_use_cases = RoomGrantUseCases::new(self.config.grant_settings());
        AppState {
            config: Arc::new(self.config),
            room_grant_use_cases: Arc::new(room_grant_use_cases),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
