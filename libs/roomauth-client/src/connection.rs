//! Fetching room connection details from the grant minting service.

use std::sync::Arc;

use reqwest::StatusCode;
use roomauth_types::{ConnectionDetails, ConnectionDetailsRequest, ErrorCode, GrantUser, User};
use tracing::instrument;
use url::Url;

use crate::error::TransportError;
use crate::session::{Session, SessionStatus};
use crate::transport::{OutboundRequest, Transport};

pub struct ConnectionDetailsClient {
    transport: Arc<dyn Transport>,
    endpoint: Url,
}

impl ConnectionDetailsClient {
    pub fn new(transport: Arc<dyn Transport>, endpoint: Url) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// Minting request for the current session. Only an authenticated
    /// session sends its user.
    pub fn grant_request(session: &Session) -> ConnectionDetailsRequest {
        match (session.status(), session.user()) {
            (SessionStatus::Authenticated, Some(user)) => {
                ConnectionDetailsRequest::authenticated(grant_user(user))
            }
            (SessionStatus::Guest, _) => ConnectionDetailsRequest::guest(),
            _ => ConnectionDetailsRequest::default(),
        }
    }

    /// POST the minting request.
    ///
    /// Only a guest or anonymous request may fall back to the legacy
    /// parameterless GET, and only when the endpoint does not accept the
    /// POST form. The legacy form always mints a guest grant, so an
    /// authenticated request never takes it. Server errors, including a
    /// missing minting configuration, are returned as they are.
    #[instrument(skip_all, fields(status = %session.status()))]
    pub async fn fetch(&self, session: &Session) -> Result<ConnectionDetails, TransportError> {
        let grant_request = Self::grant_request(session);
        let request = OutboundRequest::post_json(self.endpoint.clone(), &grant_request)?;

        match self.send(&request).await {
            Err(TransportError::Status(status))
                if grant_request.user.is_none() && is_unsupported_form(status) =>
            {
                tracing::warn!(status, "POST form not supported, trying legacy form");
                self.send(&OutboundRequest::get(self.endpoint.clone())).await
            }
            result => result,
        }
    }

    async fn send(&self, request: &OutboundRequest) -> Result<ConnectionDetails, TransportError> {
        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            let status = response.status.as_u16();
            return Err(match service_error_code(&response.body) {
                Some(code) => TransportError::Service { status, code },
                None => TransportError::Status(status),
            });
        }
        response.json()
    }
}

fn is_unsupported_form(status: u16) -> bool {
    status == StatusCode::NOT_FOUND.as_u16() || status == StatusCode::METHOD_NOT_ALLOWED.as_u16()
}

/// The `code` of an error body such as `{ "code": "CONFIGURATION_ERROR" }`.
fn service_error_code(body: &[u8]) -> Option<ErrorCode> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    serde_json::from_value(value.get("code")?.clone()).ok()
}

fn grant_user(user: &User) -> GrantUser {
    GrantUser {
        id: user.id.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}
