use roomauth_types::ErrorCode;
use thiserror::Error;

/// Failures surfaced to callers of the session state machine.
///
/// All of them are recoverable: the caller may retry sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The identity provider's sign-in flow could not be started
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider credential or redirect was rejected
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// The refresh token was rejected or missing
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Every profile strategy failed, including synthesis
    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ProviderUnavailable(_) => ErrorCode::ProviderUnavailable,
            Self::VerificationFailed(_) => ErrorCode::VerificationFailed,
            Self::RefreshFailed(_) => ErrorCode::RefreshFailed,
            Self::ProfileFetchFailed(_) => ErrorCode::ProfileFetchFailed,
            Self::Unknown(_) => ErrorCode::Unknown,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Unknown(e.to_string())
    }
}

impl From<ProviderError> for SessionError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable(msg) => SessionError::ProviderUnavailable(msg),
            ProviderError::Cancelled => {
                SessionError::VerificationFailed("sign-in was cancelled".into())
            }
            ProviderError::Rejected(msg) => SessionError::VerificationFailed(msg),
        }
    }
}

/// Token store persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Claims could not be extracted from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
}

/// Errors from calls to the identity provider or profile store.
///
/// Timeouts are reported as `Network`, same as any other failed round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Network("request timed out".into())
        } else if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Errors raised while obtaining a credential from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider's client library or endpoint could not be loaded
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Sign-in cancelled")]
    Cancelled,

    #[error("Provider rejected sign-in: {0}")]
    Rejected(String),
}

/// Errors from outbound calls made through a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request was rejected as unauthorized and could not be recovered
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Request failed with status {0}")]
    Status(u16),

    /// The service answered with one of its error codes
    #[error("Request failed with status {status}: {code}")]
    Service { status: u16, code: ErrorCode },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Network("request timed out".into())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}
