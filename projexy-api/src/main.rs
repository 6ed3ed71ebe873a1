//! # ProjeXY API Server
//!
//! HTTP backend for the ProjeXY kanban app: accounts, projects, tasks,
//! comments, plan gating, subscription webhooks and realtime notifications.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/projexy JWT_SECRET=... cargo run -p projexy-api
//! ```

use projexy_api::{
    app::{build_router, AppState},
    config::Config,
};
use projexy_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    email::{HttpMailer, LogMailer, Mailer},
    realtime::{
        redis::{run_redis_bridge, sanitize_url, RedisConfig, RedisPublisher},
        Notifier,
    },
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pause before re-subscribing after the Redis bridge drops
const BRIDGE_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "projexy_api=debug,projexy_shared=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ProjeXY API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let bind_address = config.bind_address();

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let mailer: Arc<dyn Mailer> = match &config.email.api_key {
        Some(key) => Arc::new(HttpMailer::new(
            config.email.api_url.clone(),
            key.clone(),
            config.email.from.clone(),
        )?),
        None => {
            tracing::warn!("EMAIL_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let redis_url = config.redis.as_ref().map(|redis| redis.url.clone());
    let mut state = AppState::new(pool.clone(), config).with_mailer(mailer);

    if let Some(url) = redis_url {
        let publisher = RedisPublisher::new(RedisConfig::new(url.clone())).await?;
        let client = publisher.client().clone();
        let hub = state.hub.clone();

        // Events go out through Redis and come back in through the bridge, so
        // every API instance's SSE subscribers see them.
        state = state.with_notifier(Notifier::new(vec![Arc::new(publisher)]));

        tokio::spawn(async move {
            loop {
                if let Err(e) = run_redis_bridge(client.clone(), hub.clone()).await {
                    tracing::error!(url = %sanitize_url(&url), error = %e, "Redis realtime bridge failed");
                }
                tokio::time::sleep(BRIDGE_RETRY_DELAY).await;
            }
        });
    }

    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await;
    tracing::info!("Shutdown signal received, draining connections...");
}

/// Resolves when `signal` fires; never resolves if the listener itself fails
async fn wait_for_signal(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn test_signal_resolves_shutdown() {
        let waited =
            tokio::time::timeout(Duration::from_millis(100), wait_for_signal(async { Ok(()) })).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_listener_failure_does_not_shut_down() {
        let failing = async { Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) };
        let waited =
            tokio::time::timeout(Duration::from_millis(100), wait_for_signal(failing)).await;
        assert!(waited.is_err());
    }
}
