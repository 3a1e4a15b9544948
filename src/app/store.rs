//! Storage seams of the notification engine.
//!
//! [`NotificationStore`] owns the notification records. [`PostDirectory`] and
//! [`UserDirectory`] are read-only views onto data owned by the posts and users
//! services.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::notification::{CorrelationKey, NewNotification, Notification};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a create call.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Notification),
    /// A like notification with the same correlation key already existed and
    /// deduplication was requested.
    Existing(Notification),
}

impl CreateOutcome {
    pub fn notification(&self) -> &Notification {
        match self {
            Self::Created(notification) | Self::Existing(notification) => notification,
        }
    }

    pub fn into_notification(self) -> Notification {
        match self {
            Self::Created(notification) | Self::Existing(notification) => notification,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Keyset position: strictly older than `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: OffsetDateTime,
    pub id: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub cursor: Option<Cursor>,
    pub limit: Option<i64>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores the notification and its correlation atomically.
    ///
    /// With `dedup` set, a like notification whose correlation key is already
    /// present is not stored again and the existing record is returned.
    async fn create(
        &self,
        notification: NewNotification,
        dedup: bool,
    ) -> StoreResult<CreateOutcome>;

    /// Notifications of a user ordered by `created_at DESC, id DESC`.
    /// `liker_display_name` is left empty.
    async fn list_by_user(&self, user_id: i64, page: Page) -> StoreResult<Vec<Notification>>;

    async fn unread_count(&self, user_id: i64) -> StoreResult<i64>;

    /// Returns whether a row changed state.
    async fn mark_read(&self, notification_id: i64) -> StoreResult<bool>;

    /// Deletes every notification matching the key. Returns the number removed.
    async fn delete_by_correlation(&self, key: &CorrelationKey) -> StoreResult<u64>;

    async fn clear_all(&self, user_id: i64) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait PostDirectory: Send + Sync {
    async fn author_of(&self, post_id: i64) -> StoreResult<Option<i64>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Display names of the users that could be resolved; unknown ids are absent.
    async fn display_names(&self, user_ids: &[i64]) -> StoreResult<HashMap<i64, String>>;
}
