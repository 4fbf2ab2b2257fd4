//! Shared wire types for room session authentication.
//!
//! This crate provides:
//! - The canonical `User` record and the persisted `TokenPair`
//! - Token exchange / refresh response shapes (`AuthResponse`)
//! - Connection-details request and response bodies used by the grant minting service
//! - Error codes shared between the client and the minting service

mod connection;
mod errors;
mod tokens;
mod user;

pub use connection::{ConnectionDetails, ConnectionDetailsRequest, GrantUser};
pub use errors::ErrorCode;
pub use tokens::{AuthResponse, IssuedTokens, TokenPair};
pub use user::User;
