use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::notifications::NotificationError;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Maps an engine error to a response. `failure` is the message used for
    /// storage failures, whose details stay in the logs.
    pub fn from_notification(err: NotificationError, failure: &str) -> Self {
        match err {
            NotificationError::Validation(message) => Self::bad_request(message),
            NotificationError::PostNotFound(_) => Self::not_found("post not found"),
            NotificationError::SelfActionRejected => Self::bad_request(
                "Notification not added: Author cannot send notification to themselves",
            ),
            NotificationError::Persistence(_) => Self::internal(failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
