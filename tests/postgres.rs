//! Postgres Store Tests
//!
//! Runs the store against a real database. Set `TEST_DATABASE_URL` (or
//! `DATABASE_URL`) to enable; without it every test returns early.
//!
//! The `posts` and `users` tables belong to other services; the tests create
//! minimal versions of them when they are missing.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::OnceCell;

use notifier::app::notifications::{
    LikeDedup, NotificationError, NotificationEvent, NotificationService,
};
use notifier::app::store::{NotificationStore, Page};
use notifier::domain::notification::{CorrelationKey, LikeCorrelation, NewNotification};
use notifier::infra::db::Db;
use notifier::infra::pg_store::PgNotificationStore;

/// Post id whose like rows are refused by a test trigger.
const REFUSED_POST_ID: i64 = -7;

static SCHEMA: OnceCell<()> = OnceCell::const_new();
static NEXT_ID: AtomicI64 = AtomicI64::new(0);

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

/// Ids unique across runs against the same database.
fn unique_id() -> i64 {
    let base = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    (base % 1_000_000_000_000) * 1_000 + NEXT_ID.fetch_add(1, Ordering::SeqCst) % 1_000
}

async fn connect(url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(8)
        .connect(url)
        .await
        .expect("cannot connect to test database")
}

async fn prepare_schema(url: &str) {
    let pool = connect(url).await;
    Db::from_pool(pool.clone())
        .migrate("migrations")
        .await
        .expect("migrations failed");

    let fixtures = format!(
        "CREATE TABLE IF NOT EXISTS posts (id BIGINT PRIMARY KEY, author_id BIGINT NOT NULL); \
         CREATE TABLE IF NOT EXISTS users (id BIGINT PRIMARY KEY, username TEXT NOT NULL); \
         CREATE OR REPLACE FUNCTION refuse_test_like() RETURNS trigger AS $$ \
         BEGIN \
             IF NEW.post_id = {REFUSED_POST_ID} THEN \
                 RAISE EXCEPTION 'like row refused'; \
             END IF; \
             RETURN NEW; \
         END $$ LANGUAGE plpgsql; \
         DROP TRIGGER IF EXISTS refuse_test_like ON notification_like; \
         CREATE TRIGGER refuse_test_like BEFORE INSERT ON notification_like \
             FOR EACH ROW EXECUTE FUNCTION refuse_test_like();"
    );
    sqlx::raw_sql(&fixtures)
        .execute(&pool)
        .await
        .expect("failed to prepare fixture tables");

    pool.close().await;
}

/// A fresh pool for the current test runtime, once the schema is in place.
async fn pg() -> Option<(PgPool, Arc<PgNotificationStore>)> {
    let url = database_url()?;
    SCHEMA.get_or_init(|| prepare_schema(&url)).await;
    let pool = connect(&url).await;
    let store = Arc::new(PgNotificationStore::new(Db::from_pool(pool.clone())));
    Some((pool, store))
}

async fn insert_post(pool: &PgPool, post_id: i64, author_id: i64) {
    sqlx::query(
        "INSERT INTO posts (id, author_id) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET author_id = EXCLUDED.author_id",
    )
    .bind(post_id)
    .bind(author_id)
    .execute(pool)
    .await
    .expect("failed to insert post");
}

async fn insert_user(pool: &PgPool, user_id: i64, username: &str) {
    sqlx::query(
        "INSERT INTO users (id, username) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username",
    )
    .bind(user_id)
    .bind(username)
    .execute(pool)
    .await
    .expect("failed to insert user");
}

async fn row_count(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count failed")
}

fn new_like(user_id: i64, liker_id: i64, post_id: i64) -> NewNotification {
    NewNotification {
        user_id,
        message: "liked your post".into(),
        created_at: OffsetDateTime::now_utc(),
        notification_type: "like".into(),
        correlation: Some(LikeCorrelation { liker_id, post_id }),
    }
}

fn service(store: &Arc<PgNotificationStore>) -> NotificationService {
    NotificationService::new(store.clone(), store.clone(), store.clone(), LikeDedup::Enabled)
}

// ===========================================================================
// Store
// ===========================================================================

#[tokio::test]
async fn failed_like_row_rolls_back_notification() {
    let Some((pool, store)) = pg().await else {
        return;
    };
    let user = unique_id();

    let result = store
        .create(new_like(user, unique_id(), REFUSED_POST_ID), false)
        .await;
    assert!(result.is_err());
    assert_eq!(row_count(&pool, user).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_likes_store_one_row() {
    let Some((pool, store)) = pg().await else {
        return;
    };
    let (user, liker, post) = (unique_id(), unique_id(), unique_id());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.create(new_like(user, liker, post), true).await
        }));
    }

    let mut created = 0;
    for task in tasks {
        let outcome = task.await.expect("task panicked").expect("create failed");
        if outcome.is_created() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(row_count(&pool, user).await, 1);
}

#[tokio::test]
async fn created_timestamp_matches_stored_value() {
    let Some((_pool, store)) = pg().await else {
        return;
    };
    let user = unique_id();

    let created = store
        .create(new_like(user, unique_id(), unique_id()), true)
        .await
        .expect("create failed")
        .into_notification();
    let listed = store
        .list_by_user(user, Page::default())
        .await
        .expect("list failed");

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].created_at, created.created_at);
    assert_eq!(created.created_at.nanosecond() % 1_000, 0);
}

#[tokio::test]
async fn delete_matches_full_correlation_key() {
    let Some((pool, store)) = pg().await else {
        return;
    };
    let (user, liker, post) = (unique_id(), unique_id(), unique_id());
    let other_post = unique_id();

    store.create(new_like(user, liker, post), false).await.unwrap();
    store.create(new_like(user, liker, post), false).await.unwrap();
    store.create(new_like(user, liker, other_post), false).await.unwrap();
    store.create(new_like(user, unique_id(), post), false).await.unwrap();

    let deleted = store
        .delete_by_correlation(&CorrelationKey {
            user_id: user,
            liker_id: liker,
            post_id: post,
            notification_type: "like".into(),
        })
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(row_count(&pool, user).await, 2);

    let like_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notification_like nl \
         JOIN notifications n ON n.id = nl.notification_id \
         WHERE n.user_id = $1",
    )
    .bind(user)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(like_rows, 2);
}

// ===========================================================================
// Service over Postgres
// ===========================================================================

#[tokio::test]
async fn listing_resolves_liker_usernames() {
    let Some((pool, store)) = pg().await else {
        return;
    };
    let (author, liker, post) = (unique_id(), unique_id(), unique_id());
    insert_post(&pool, post, author).await;
    insert_user(&pool, liker, "marta").await;

    let service = service(&store);
    service
        .create(NotificationEvent {
            user_id: author,
            liker_id: liker,
            post_id: post,
            notification_type: "like".into(),
            message: "marta liked your post".into(),
        })
        .await
        .expect("create failed");

    let listed = service.list(author, Page::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].liker_display_name, "marta");
    assert_eq!(service.unread_count(author).await.unwrap(), 1);

    service.mark_read(listed[0].id).await.unwrap();
    assert_eq!(service.unread_count(author).await.unwrap(), 0);
}

#[tokio::test]
async fn self_like_is_rejected_against_posts_table() {
    let Some((pool, store)) = pg().await else {
        return;
    };
    let (author, post) = (unique_id(), unique_id());
    insert_post(&pool, post, author).await;

    let err = service(&store)
        .create(NotificationEvent {
            user_id: author,
            liker_id: author,
            post_id: post,
            notification_type: "like".into(),
            message: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, NotificationError::SelfActionRejected));
    assert_eq!(row_count(&pool, author).await, 0);

    service(&store).ping().await.expect("ping failed");
}
