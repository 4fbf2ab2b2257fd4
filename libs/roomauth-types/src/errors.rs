use serde::{Deserialize, Serialize};

/// Error codes surfaced by the session client and the grant minting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ProviderUnavailable,
    VerificationFailed,
    RefreshFailed,
    ProfileFetchFailed,
    MalformedToken,
    ConfigurationError,
    InvalidInput,
    Unauthorized,
    InternalError,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::ProfileFetchFailed => "PROFILE_FETCH_FAILED",
            Self::MalformedToken => "MALFORMED_TOKEN",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
