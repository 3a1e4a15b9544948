use axum::{routing::delete, routing::get, routing::patch, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::list_notifications)
                .post(handlers::create_notification)
                .delete(handlers::delete_notification),
        )
        .route("/notifications/unread-count", get(handlers::unread_count))
        .route("/notifications/read", patch(handlers::mark_notification_read))
        .route("/notifications/:user_id/clear", delete(handlers::clear_notifications))
}
