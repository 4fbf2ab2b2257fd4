pub mod connection_details;
pub mod health;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(connection_details::router())
        .merge(health::router())
}
