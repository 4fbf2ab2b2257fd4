use std::sync::Arc;

use crate::{infra::config::AppConfig, use_cases::room_grant::RoomGrantUseCases};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub room_grant_use_cases: Arc<RoomGrantUseCases>,
}
