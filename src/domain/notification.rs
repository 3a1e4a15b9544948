use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Discriminator of notifications that carry a [`LikeCorrelation`].
pub const LIKE_TYPE: &str = "like";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(flatten)]
    pub correlation: Option<LikeCorrelation>,
    /// Resolved at read time; empty when the liker is unknown.
    #[serde(
        rename = "likerUsername",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub liker_display_name: String,
}

impl Notification {
    pub fn is_like(&self) -> bool {
        self.notification_type == LIKE_TYPE
    }
}

/// The liker/post pair attached to a like notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCorrelation {
    pub liker_id: i64,
    pub post_id: i64,
}

/// A classified notification that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub message: String,
    pub created_at: OffsetDateTime,
    pub notification_type: String,
    pub correlation: Option<LikeCorrelation>,
}

/// Full key used to find the notification of one like event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub user_id: i64,
    pub liker_id: i64,
    pub post_id: i64,
    pub notification_type: String,
}

impl CorrelationKey {
    pub fn of(notification: &NewNotification) -> Option<Self> {
        let correlation = notification.correlation?;
        Some(Self {
            user_id: notification.user_id,
            liker_id: correlation.liker_id,
            post_id: correlation.post_id,
            notification_type: notification.notification_type.clone(),
        })
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        notification.user_id == self.user_id
            && notification.notification_type == self.notification_type
            && notification.correlation
                == Some(LikeCorrelation {
                    liker_id: self.liker_id,
                    post_id: self.post_id,
                })
    }

    /// Stable text form, used as the advisory lock key in Postgres.
    pub fn lock_key(&self) -> String {
        format!(
            "notification:{}:{}:{}:{}",
            self.notification_type, self.user_id, self.liker_id, self.post_id
        )
    }
}
