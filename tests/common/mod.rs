#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use notifier::app::notifications::{LikeDedup, NotificationService};
use notifier::infra::memory::MemoryStore;
use notifier::AppState;

// ---------------------------------------------------------------------------
// TestApp — one per test, backed by the in-memory store
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    body_bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn items(&self) -> Vec<Value> {
        self.json()["items"].as_array().cloned().unwrap_or_default()
    }
}

pub fn service(store: &Arc<MemoryStore>, like_dedup: LikeDedup) -> NotificationService {
    NotificationService::new(store.clone(), store.clone(), store.clone(), like_dedup)
}

/// App with like deduplication enabled (the default configuration).
pub async fn app() -> TestApp {
    TestApp::with_dedup(LikeDedup::Enabled).await
}

impl TestApp {
    pub async fn with_dedup(like_dedup: LikeDedup) -> Self {
        Self::build(like_dedup, 200).await
    }

    pub async fn with_list_max_limit(list_max_limit: i64) -> Self {
        Self::build(LikeDedup::Enabled, list_max_limit).await
    }

    async fn build(like_dedup: LikeDedup, list_max_limit: i64) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            notifications: service(&store, like_dedup),
            list_max_limit,
            cors_allowed_origins: Vec::new(),
            request_body_limit_bytes: 64 * 1024,
        };
        let router = notifier::http::router(state.clone());

        TestApp {
            router,
            store,
            state,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None, &[]).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    pub async fn patch(&self, path: &str) -> TestResponse {
        self.request(Method::PATCH, path, None, &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None, &[]).await
    }

    pub async fn delete_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::DELETE, path, Some(body), &[]).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Register a post owned by `author_id` with the post lookup.
    pub async fn create_post(&self, post_id: i64, author_id: i64) {
        self.store.insert_post(post_id, author_id).await;
    }

    /// Register a user with the identity lookup.
    pub async fn create_user(&self, user_id: i64, username: &str) {
        self.store.insert_user(user_id, username).await;
    }

    /// POST a like notification and return the response.
    pub async fn like(&self, recipient: i64, liker: i64, post: i64) -> TestResponse {
        self.post_json(
            "/notifications",
            serde_json::json!({
                "userId": recipient,
                "likerId": liker,
                "postId": post,
                "type": "like",
                "message": format!("user {} liked your post", liker),
            }),
        )
        .await
    }

    pub async fn list(&self, user_id: i64) -> TestResponse {
        self.get(&format!("/notifications?userId={}", user_id)).await
    }
}
