pub mod app_error;
pub mod grant_token;
pub mod use_cases;
