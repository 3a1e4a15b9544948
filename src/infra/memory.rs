use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::app::store::{
    CreateOutcome, NotificationStore, Page, PostDirectory, StoreResult, UserDirectory,
};
use crate::domain::notification::{CorrelationKey, NewNotification, Notification};

/// In-process store holding notifications plus the post authors and user names
/// the engine looks up. A single lock makes every operation atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    notifications: BTreeMap<i64, Notification>,
    post_authors: HashMap<i64, i64>,
    display_names: HashMap<i64, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_post(&self, post_id: i64, author_id: i64) {
        self.state.write().await.post_authors.insert(post_id, author_id);
    }

    pub async fn insert_user(&self, user_id: i64, display_name: impl Into<String>) {
        self.state
            .write()
            .await
            .display_names
            .insert(user_id, display_name.into());
    }

    pub async fn remove_user(&self, user_id: i64) {
        self.state.write().await.display_names.remove(&user_id);
    }

    /// Total stored notifications across all users.
    pub async fn len(&self) -> usize {
        self.state.read().await.notifications.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(
        &self,
        notification: NewNotification,
        dedup: bool,
    ) -> StoreResult<CreateOutcome> {
        let mut state = self.state.write().await;

        if dedup {
            if let Some(key) = CorrelationKey::of(&notification) {
                let existing = state
                    .notifications
                    .values()
                    .filter(|stored| key.matches(stored))
                    .max_by_key(|stored| (stored.created_at, stored.id));
                if let Some(existing) = existing {
                    return Ok(CreateOutcome::Existing(existing.clone()));
                }
            }
        }

        state.next_id += 1;
        let stored = Notification {
            id: state.next_id,
            user_id: notification.user_id,
            message: notification.message,
            is_read: false,
            created_at: notification.created_at,
            notification_type: notification.notification_type,
            correlation: notification.correlation,
            liker_display_name: String::new(),
        };
        state.notifications.insert(stored.id, stored.clone());

        Ok(CreateOutcome::Created(stored))
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> StoreResult<Vec<Notification>> {
        let state = self.state.read().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|stored| stored.user_id == user_id)
            .filter(|stored| match page.cursor {
                Some(cursor) => (stored.created_at, stored.id) < (cursor.created_at, cursor.id),
                None => true,
            })
            .cloned()
            .collect();

        notifications.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        if let Some(limit) = page.limit {
            notifications.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: i64) -> StoreResult<i64> {
        let state = self.state.read().await;
        let count = state
            .notifications
            .values()
            .filter(|stored| stored.user_id == user_id && !stored.is_read)
            .count();
        Ok(count as i64)
    }

    async fn mark_read(&self, notification_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.notifications.get_mut(&notification_id) {
            Some(stored) if !stored.is_read => {
                stored.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_by_correlation(&self, key: &CorrelationKey) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|_, stored| !key.matches(stored));
        Ok((before - state.notifications.len()) as u64)
    }

    async fn clear_all(&self, user_id: i64) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|_, stored| stored.user_id != user_id);
        Ok((before - state.notifications.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PostDirectory for MemoryStore {
    async fn author_of(&self, post_id: i64) -> StoreResult<Option<i64>> {
        Ok(self.state.read().await.post_authors.get(&post_id).copied())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn display_names(&self, user_ids: &[i64]) -> StoreResult<HashMap<i64, String>> {
        let state = self.state.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.display_names.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}
