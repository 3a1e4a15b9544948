use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::notifications::{NotificationError, NotificationEvent};
use crate::app::store::{CreateOutcome, Cursor, Page};
use crate::domain::notification::{CorrelationKey, Notification};
use crate::http::AppError;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<Cursor>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .rsplit_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let created_at = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = id
        .parse::<i64>()
        .map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some(Cursor { created_at, id }))
}

fn encode_cursor(cursor: Option<Cursor>) -> Option<String> {
    let cursor = cursor?;
    let timestamp = cursor.created_at.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, cursor.id))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.notifications.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "health check failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub liker_id: i64,
    #[serde(default)]
    pub post_id: i64,
    #[serde(default, rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub message: String,
}

pub async fn create_notification(
    State(state): State<AppState>,
    payload: Result<Json<CreateNotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let Json(payload) = payload.map_err(|_| AppError::bad_request("invalid request body"))?;
    let (user_id, liker_id, post_id) = (payload.user_id, payload.liker_id, payload.post_id);

    let outcome = state
        .notifications
        .create(NotificationEvent {
            user_id,
            liker_id,
            post_id,
            notification_type: payload.notification_type,
            message: payload.message,
        })
        .await
        .map_err(|err| {
            if let NotificationError::Persistence(source) = &err {
                tracing::error!(
                    error = ?source,
                    user_id,
                    liker_id,
                    post_id,
                    "failed to create notification"
                );
            }
            AppError::from_notification(err, "failed to add notification")
        })?;

    let status = match outcome {
        CreateOutcome::Created(_) => StatusCode::CREATED,
        CreateOutcome::Existing(_) => StatusCode::OK,
    };
    Ok((status, Json(outcome.into_notification())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    query: Result<Query<ListNotificationsQuery>, QueryRejection>,
) -> Result<Json<ListResponse<Notification>>, AppError> {
    let Query(query) = query.map_err(|_| AppError::bad_request("invalid query parameters"))?;
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::bad_request("User ID is required"))?;

    if let Some(limit) = query.limit {
        if !(1..=state.list_max_limit).contains(&limit) {
            return Err(AppError::bad_request(format!(
                "limit must be between 1 and {}",
                state.list_max_limit
            )));
        }
    }
    let cursor = parse_cursor(query.cursor)?;

    // One extra row tells whether another page exists.
    let page = Page {
        cursor,
        limit: query.limit.map(|limit| limit.saturating_add(1)),
    };
    let mut notifications = state.notifications.list(user_id, page).await.map_err(|err| {
        if let NotificationError::Persistence(source) = &err {
            tracing::error!(error = ?source, user_id, "failed to fetch notifications");
        }
        AppError::from_notification(err, "failed to fetch notifications")
    })?;

    let next_cursor = match query.limit {
        Some(limit) if notifications.len() > limit as usize => {
            notifications.truncate(limit as usize);
            notifications.last().map(|last| Cursor {
                created_at: last.created_at,
                id: last.id,
            })
        }
        _ => None,
    };

    Ok(Json(ListResponse {
        items: notifications,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<i64>,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

pub async fn unread_count(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let Query(query) = query.map_err(|_| AppError::bad_request("invalid query parameters"))?;
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::bad_request("User ID is required"))?;

    let unread = state
        .notifications
        .unread_count(user_id)
        .await
        .map_err(|err| {
            if let NotificationError::Persistence(source) = &err {
                tracing::error!(error = ?source, user_id, "failed to count unread notifications");
            }
            AppError::from_notification(err, "failed to count unread notifications")
        })?;

    Ok(Json(UnreadCountResponse { unread }))
}

#[derive(Deserialize)]
pub struct MarkReadQuery {
    pub id: Option<i64>,
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    query: Result<Query<MarkReadQuery>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let Query(query) = query.map_err(|_| AppError::bad_request("invalid query parameters"))?;
    let id = query
        .id
        .ok_or_else(|| AppError::bad_request("Notification ID is required"))?;

    state.notifications.mark_read(id).await.map_err(|err| {
        if let NotificationError::Persistence(source) = &err {
            tracing::error!(error = ?source, notification_id = id, "failed to mark notification read");
        }
        AppError::from_notification(err, "failed to mark notification as read")
    })?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNotificationRequest {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub liker_id: i64,
    #[serde(default)]
    pub post_id: i64,
    #[serde(default, rename = "type")]
    pub notification_type: String,
}

pub async fn delete_notification(
    State(state): State<AppState>,
    payload: Result<Json<DeleteNotificationRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::bad_request("invalid request body"))?;
    let key = CorrelationKey {
        user_id: payload.user_id,
        liker_id: payload.liker_id,
        post_id: payload.post_id,
        notification_type: payload.notification_type,
    };
    let (user_id, liker_id, post_id) = (key.user_id, key.liker_id, key.post_id);

    state
        .notifications
        .delete_by_correlation(key)
        .await
        .map_err(|err| {
            if let NotificationError::Persistence(source) = &err {
                tracing::error!(
                    error = ?source,
                    user_id,
                    liker_id,
                    post_id,
                    "failed to delete notification"
                );
            }
            AppError::from_notification(err, "failed to delete notification")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_notifications(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(user_id) = user_id.map_err(|_| AppError::bad_request("User ID is required"))?;

    state.notifications.clear_all(user_id).await.map_err(|err| {
        if let NotificationError::Persistence(source) = &err {
            tracing::error!(error = ?source, user_id, "failed to clear notifications");
        }
        AppError::from_notification(err, "failed to clear notifications")
    })?;

    Ok(StatusCode::NO_CONTENT)
}
