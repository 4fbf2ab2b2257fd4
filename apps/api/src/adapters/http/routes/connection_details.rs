//! Room connection details: mints a grant for the caller.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use roomauth_types::{ConnectionDetails, ConnectionDetailsRequest};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    use_cases::room_grant::{IdentityContext, RoomRequest},
};

/// POST /api/connection-details
/// Body: `{ user: { id, email, firstName?, lastName? } | null, isGuest }`.
/// An empty body is treated like the legacy GET.
async fn create_connection_details(
    State(app_state): State<AppState>,
    body: Bytes,
) -> AppResult<Response> {
    let request = parse_request(&body)?;
    mint_response(&app_state, &IdentityContext::from_request(&request))
}

/// GET /api/connection-details
/// Legacy parameterless form, always a guest grant.
async fn legacy_connection_details(
    State(app_state): State<AppState>,
) -> AppResult<Response> {
    mint_response(&app_state, &IdentityContext::Guest)
}

fn parse_request(body: &[u8]) -> AppResult<ConnectionDetailsRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConnectionDetailsRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid connection details request: {e}")))
}

fn mint_response(app_state: &AppState, context: &IdentityContext) -> AppResult<Response> {
    let grant = app_state
        .room_grant_use_cases
        .mint(context, &RoomRequest::default())?;
    tracing::debug!(expires_at = %grant.expires_at, "Returning connection details");

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(ConnectionDetails::from(grant)),
    )
        .into_response())
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route(
        "/connection-details",
        post(create_connection_details).get(legacy_connection_details),
    )
}
