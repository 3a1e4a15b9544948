use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::app::store::{
    CreateOutcome, NotificationStore, Page, PostDirectory, StoreError, UserDirectory,
};
use crate::domain::notification::{
    CorrelationKey, LikeCorrelation, NewNotification, Notification, LIKE_TYPE,
};

/// Whether repeated like events for the same (recipient, liker, post) produce
/// one notification or accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeDedup {
    Enabled,
    Disabled,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{0}")]
    Validation(String),

    #[error("post {0} not found")]
    PostNotFound(i64),

    #[error("author cannot send notification to themselves")]
    SelfActionRejected,

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

pub type NotificationResult<T> = Result<T, NotificationError>;

/// An interaction event that may become a notification.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub user_id: i64,
    pub liker_id: i64,
    pub post_id: i64,
    pub notification_type: String,
    pub message: String,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    posts: Arc<dyn PostDirectory>,
    users: Arc<dyn UserDirectory>,
    like_dedup: LikeDedup,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        posts: Arc<dyn PostDirectory>,
        users: Arc<dyn UserDirectory>,
        like_dedup: LikeDedup,
    ) -> Self {
        Self {
            store,
            posts,
            users,
            like_dedup,
        }
    }

    /// Validates the event, applies the self-action guard and stores the result.
    pub async fn create(&self, event: NotificationEvent) -> NotificationResult<CreateOutcome> {
        let notification = self.classify(event).await?;
        let dedup = self.like_dedup == LikeDedup::Enabled;

        let outcome = self.store.create(notification, dedup).await?;
        match &outcome {
            CreateOutcome::Created(created) => tracing::info!(
                notification_id = created.id,
                user_id = created.user_id,
                notification_type = %created.notification_type,
                "notification created"
            ),
            CreateOutcome::Existing(existing) => tracing::debug!(
                notification_id = existing.id,
                user_id = existing.user_id,
                "like notification already present"
            ),
        }
        Ok(outcome)
    }

    /// Turns an event into a storable notification, or rejects it.
    pub async fn classify(&self, event: NotificationEvent) -> NotificationResult<NewNotification> {
        if event.user_id <= 0 {
            return Err(NotificationError::Validation(
                "userId must be a positive identifier".into(),
            ));
        }
        validate_type(&event.notification_type)?;
        let notification_type = event.notification_type.as_str();

        let correlation = if notification_type == LIKE_TYPE {
            if event.liker_id <= 0 || event.post_id <= 0 {
                return Err(NotificationError::Validation(
                    "likerId and postId are required for like notifications".into(),
                ));
            }
            self.guard_like(&event).await?;
            Some(LikeCorrelation {
                liker_id: event.liker_id,
                post_id: event.post_id,
            })
        } else {
            None
        };

        Ok(NewNotification {
            user_id: event.user_id,
            message: event.message,
            created_at: OffsetDateTime::now_utc(),
            notification_type: notification_type.to_string(),
            correlation,
        })
    }

    async fn guard_like(&self, event: &NotificationEvent) -> NotificationResult<()> {
        let author_id = self
            .posts
            .author_of(event.post_id)
            .await?
            .ok_or(NotificationError::PostNotFound(event.post_id))?;

        if author_id == event.liker_id || event.user_id == event.liker_id {
            tracing::debug!(
                post_id = event.post_id,
                liker_id = event.liker_id,
                "rejected self notification"
            );
            return Err(NotificationError::SelfActionRejected);
        }
        Ok(())
    }

    pub async fn list(&self, user_id: i64, page: Page) -> NotificationResult<Vec<Notification>> {
        let mut notifications = self.store.list_by_user(user_id, page).await?;
        self.enrich(&mut notifications).await;
        Ok(notifications)
    }

    /// Fills in liker display names. Lookup failures leave the names empty.
    async fn enrich(&self, notifications: &mut [Notification]) {
        let mut liker_ids: Vec<i64> = notifications
            .iter()
            .filter_map(|notification| notification.correlation)
            .map(|correlation| correlation.liker_id)
            .collect();
        if liker_ids.is_empty() {
            return;
        }
        liker_ids.sort_unstable();
        liker_ids.dedup();

        let names = match self.users.display_names(&liker_ids).await {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(error = ?err, "failed to resolve liker display names");
                return;
            }
        };

        for notification in notifications.iter_mut() {
            if let Some(name) = notification
                .correlation
                .and_then(|correlation| names.get(&correlation.liker_id))
            {
                notification.liker_display_name = name.clone();
            }
        }
    }

    pub async fn unread_count(&self, user_id: i64) -> NotificationResult<i64> {
        Ok(self.store.unread_count(user_id).await?)
    }

    /// Missing and already-read notifications are both a silent no-op.
    pub async fn mark_read(&self, notification_id: i64) -> NotificationResult<()> {
        let changed = self.store.mark_read(notification_id).await?;
        if !changed {
            tracing::debug!(notification_id, "mark read changed nothing");
        }
        Ok(())
    }

    pub async fn delete_by_correlation(&self, key: CorrelationKey) -> NotificationResult<u64> {
        if key.user_id <= 0 || key.liker_id <= 0 || key.post_id <= 0 {
            return Err(NotificationError::Validation(
                "invalid or missing notification data".into(),
            ));
        }
        validate_type(&key.notification_type)?;

        let deleted = self.store.delete_by_correlation(&key).await?;
        tracing::info!(
            user_id = key.user_id,
            liker_id = key.liker_id,
            post_id = key.post_id,
            deleted,
            "notifications deleted by correlation"
        );
        Ok(deleted)
    }

    pub async fn clear_all(&self, user_id: i64) -> NotificationResult<u64> {
        if user_id <= 0 {
            return Err(NotificationError::Validation(
                "userId must be a positive identifier".into(),
            ));
        }
        let cleared = self.store.clear_all(user_id).await?;
        tracing::info!(user_id, cleared, "notifications cleared");
        Ok(cleared)
    }

    pub async fn ping(&self) -> NotificationResult<()> {
        Ok(self.store.ping().await?)
    }
}

/// Types are stored and matched verbatim, so padded values are rejected
/// instead of being silently rewritten.
fn validate_type(notification_type: &str) -> NotificationResult<()> {
    if notification_type.trim().is_empty() {
        return Err(NotificationError::Validation("type is required".into()));
    }
    if notification_type.trim() != notification_type {
        return Err(NotificationError::Validation(
            "type must not have leading or trailing whitespace".into(),
        ));
    }
    Ok(())
}
