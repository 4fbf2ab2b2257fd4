//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use roomauth_types::GrantUser;
use secrecy::SecretString;
use time::Duration;

use crate::use_cases::room_grant::GrantSettings;

pub const TEST_LIVEKIT_URL: &str = "wss://livekit.test.example.com";
pub const TEST_API_KEY: &str = "APItestkey";
const TEST_API_SECRET: &str = "test-livekit-secret-0123456789abcdef";

pub fn test_api_secret() -> SecretString {
    SecretString::new(TEST_API_SECRET.into())
}

/// Fully configured settings with the default 15 minute validity.
pub fn test_grant_settings() -> GrantSettings {
    GrantSettings {
        server_url: Some(TEST_LIVEKIT_URL.to_string()),
        api_key: Some(TEST_API_KEY.to_string()),
        api_secret: Some(test_api_secret()),
        ttl: Duration::minutes(15),
    }
}

/// Create a test grant user with sensible defaults.
pub fn create_test_grant_user(overrides: impl FnOnce(&mut GrantUser)) -> GrantUser {
    let mut user = GrantUser {
        id: "user-1".to_string(),
        email: "user@example.com".to_string(),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
    };
    overrides(&mut user);
    user
}
