//! Client-side session lifecycle for joining rooms.
//!
//! This crate owns everything between "the app started" and "here is a room
//! grant request":
//!
//! - **Token store** - Persist the access/refresh pair and the cached user together
//! - **Claims decoder** - Read the unverified subject of an access token for display fallbacks
//! - **User resolver** - Canonical profile, alternative paths, cache, then a provisional user
//! - **Session state machine** - Provider, redirect and password sign-in, guest entry, sign-out and refresh
//! - **Transport interceptor** - Bearer credentials with a single refresh-and-replay on 401
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use roomauth_client::{SessionConfig, SessionManager, ConnectionDetailsClient, ReqwestTransport};
//!
//! let config = SessionConfig::from_env()?;
//! let session = Arc::new(SessionManager::from_config(&config)?);
//! session.initialize().await;
//!
//! if !session.session().is_authenticated() {
//!     session.sign_in_as_guest().await;
//! }
//!
//! let http = roomauth_client::try_build_client_for(&config)?;
//! let details = ConnectionDetailsClient::new(
//!     Arc::new(ReqwestTransport::new(http)),
//!     config.connection_details_url.clone(),
//! )
//! .fetch(&session.session())
//! .await?;
//! ```

mod backend;
pub mod claims;
mod config;
mod connection;
mod error;
mod http_client;
mod profile;
mod provider;
mod session;
mod store;
mod transport;

#[cfg(test)]
mod test_utils;

pub use backend::{AuthBackend, HttpAuthBackend};
pub use claims::Claims;
pub use config::{
    DEFAULT_CANDIDATE_PROFILE_PATHS, DEFAULT_CANONICAL_PROFILE_PATH, SessionConfig,
};
pub use connection::ConnectionDetailsClient;
pub use error::{
    BackendError, ClaimsError, ConfigError, ProviderError, SessionError, StoreError,
    TransportError,
};
pub use http_client::{try_build_client, try_build_client_for};
pub use profile::{
    HttpProfileClient, ProfileClient, ProfileShape, ResolveSource, Resolved, UserResolver,
    parse_profile, synthesize_user,
};
pub use provider::{
    CallbackOutcome, CredentialSource, ProviderCredential, RedirectCallback, UserHint,
};
pub use session::{Session, SessionManager, SessionStatus};
pub use store::{FileTokenStore, InMemoryTokenStore, TokenStore};
pub use transport::{
    AuthorizedClient, OutboundRequest, Reauthenticator, ReqwestTransport, Transport,
    TransportResponse,
};

// Re-export shared types for convenience
pub use roomauth_types::{
    ConnectionDetails, ConnectionDetailsRequest, ErrorCode, GrantUser, TokenPair, User,
};
