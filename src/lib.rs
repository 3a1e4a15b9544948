pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::notifications::NotificationService;

#[derive(Clone)]
pub struct AppState {
    pub notifications: NotificationService,
    pub list_max_limit: i64,
    pub cors_allowed_origins: Vec<String>,
    pub request_body_limit_bytes: usize,
}
