use anyhow::anyhow;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notifier::app::notifications::NotificationService;
use notifier::config::AppConfig;
use notifier::infra::{db::Db, pg_store::PgNotificationStore};
use notifier::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;

    match config.app_mode.as_str() {
        "api" => {
            if config.run_migrations {
                db.migrate(&config.migrations_dir).await?;
            }

            let store = Arc::new(PgNotificationStore::new(db));
            let notifications = NotificationService::new(
                store.clone(),
                store.clone(),
                store,
                config.like_dedup,
            );
            let state = AppState {
                notifications,
                list_max_limit: config.list_max_limit,
                cors_allowed_origins: config.cors_allowed_origins.clone(),
                request_body_limit_bytes: config.request_body_limit_bytes,
            };

            let app = notifier::http::router(state);
            let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
            tracing::info!(
                like_dedup = ?config.like_dedup,
                "notification service listening on {}",
                config.http_addr
            );

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "migrate" => {
            let applied = db.migrate(&config.migrations_dir).await?;
            tracing::info!(applied, "migrations complete");
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
