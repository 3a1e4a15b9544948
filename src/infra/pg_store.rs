use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};

use crate::app::store::{
    CreateOutcome, NotificationStore, Page, PostDirectory, StoreResult, UserDirectory,
};
use crate::domain::notification::{
    CorrelationKey, LikeCorrelation, NewNotification, Notification,
};
use crate::infra::db::Db;

const SELECT_NOTIFICATION: &str = "SELECT n.id, n.user_id, n.message, n.is_read, n.created_at, n.type, \
            nl.liker_id, nl.post_id \
     FROM notifications n \
     LEFT JOIN notification_like nl ON nl.notification_id = n.id";

/// Postgres backed store. Also serves the post and user lookups, which read the
/// `posts` and `users` tables shared with the sibling services.
#[derive(Clone)]
pub struct PgNotificationStore {
    db: Db,
}

impl PgNotificationStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Serializes writers of one correlation key until the transaction ends.
    async fn lock_correlation(
        tx: &mut Transaction<'_, Postgres>,
        key: &CorrelationKey,
    ) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.lock_key())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn find_by_correlation(
        tx: &mut Transaction<'_, Postgres>,
        key: &CorrelationKey,
    ) -> StoreResult<Option<Notification>> {
        let sql = format!(
            "{SELECT_NOTIFICATION} \
             WHERE n.user_id = $1 AND nl.liker_id = $2 AND nl.post_id = $3 AND n.type = $4 \
             ORDER BY n.created_at DESC, n.id DESC \
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(key.user_id)
            .bind(key.liker_id)
            .bind(key.post_id)
            .bind(&key.notification_type)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.map(notification_from_row))
    }
}

fn notification_from_row(row: PgRow) -> Notification {
    let liker_id: Option<i64> = row.get("liker_id");
    let post_id: Option<i64> = row.get("post_id");
    let correlation = match (liker_id, post_id) {
        (Some(liker_id), Some(post_id)) => Some(LikeCorrelation { liker_id, post_id }),
        _ => None,
    };

    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
        notification_type: row.get("type"),
        correlation,
        liker_display_name: String::new(),
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(
        &self,
        notification: NewNotification,
        dedup: bool,
    ) -> StoreResult<CreateOutcome> {
        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.db.pool().begin().await?;

        if let Some(key) = CorrelationKey::of(&notification) {
            Self::lock_correlation(&mut tx, &key).await?;
            if dedup {
                if let Some(existing) = Self::find_by_correlation(&mut tx, &key).await? {
                    tx.commit().await?;
                    return Ok(CreateOutcome::Existing(existing));
                }
            }
        }

        // Postgres keeps microseconds; the stored timestamp is the one returned.
        let row = sqlx::query(
            "INSERT INTO notifications (user_id, message, is_read, created_at, type) \
             VALUES ($1, $2, FALSE, $3, $4) \
             RETURNING id, created_at",
        )
        .bind(notification.user_id)
        .bind(&notification.message)
        .bind(notification.created_at)
        .bind(&notification.notification_type)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.get("id");

        if let Some(correlation) = notification.correlation {
            sqlx::query(
                "INSERT INTO notification_like (notification_id, liker_id, post_id) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(correlation.liker_id)
            .bind(correlation.post_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(CreateOutcome::Created(Notification {
            id,
            user_id: notification.user_id,
            message: notification.message,
            is_read: false,
            created_at: row.get("created_at"),
            notification_type: notification.notification_type,
            correlation: notification.correlation,
            liker_display_name: String::new(),
        }))
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> StoreResult<Vec<Notification>> {
        let rows = match page.cursor {
            Some(cursor) => {
                let sql = format!(
                    "{SELECT_NOTIFICATION} \
                     WHERE n.user_id = $1 \
                       AND (n.created_at < $2 OR (n.created_at = $2 AND n.id < $3)) \
                     ORDER BY n.created_at DESC, n.id DESC \
                     LIMIT $4"
                );
                sqlx::query(&sql)
                    .bind(user_id)
                    .bind(cursor.created_at)
                    .bind(cursor.id)
                    .bind(page.limit)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                let sql = format!(
                    "{SELECT_NOTIFICATION} \
                     WHERE n.user_id = $1 \
                     ORDER BY n.created_at DESC, n.id DESC \
                     LIMIT $2"
                );
                sqlx::query(&sql)
                    .bind(user_id)
                    .bind(page.limit)
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        Ok(rows.into_iter().map(notification_from_row).collect())
    }

    async fn unread_count(&self, user_id: i64) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, notification_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND is_read = FALSE",
        )
        .bind(notification_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_correlation(&self, key: &CorrelationKey) -> StoreResult<u64> {
        let mut tx = self.db.pool().begin().await?;
        Self::lock_correlation(&mut tx, key).await?;

        let result = sqlx::query(
            "DELETE FROM notifications n \
             USING notification_like nl \
             WHERE n.id = nl.notification_id \
               AND n.user_id = $1 \
               AND nl.liker_id = $2 \
               AND nl.post_id = $3 \
               AND n.type = $4",
        )
        .bind(key.user_id)
        .bind(key.liker_id)
        .bind(key.post_id)
        .bind(&key.notification_type)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn clear_all(&self, user_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        Ok(())
    }
}

#[async_trait]
impl PostDirectory for PgNotificationStore {
    async fn author_of(&self, post_id: i64) -> StoreResult<Option<i64>> {
        let author_id: Option<i64> =
            sqlx::query_scalar("SELECT author_id::BIGINT FROM posts WHERE id = $1")
                .bind(post_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(author_id)
    }
}

#[async_trait]
impl UserDirectory for PgNotificationStore {
    async fn display_names(&self, user_ids: &[i64]) -> StoreResult<HashMap<i64, String>> {
        let rows = sqlx::query("SELECT id::BIGINT AS id, username FROM users WHERE id = ANY($1)")
            .bind(user_ids.to_vec())
            .fetch_all(self.db.pool())
            .await?;

        let mut names = HashMap::with_capacity(rows.len());
        for row in rows {
            names.insert(row.get::<i64, _>("id"), row.get::<String, _>("username"));
        }
        Ok(names)
    }
}
