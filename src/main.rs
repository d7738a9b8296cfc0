use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use axum_backend_template::api::{RateLimitState, RouterConfig, create_router};
use axum_backend_template::app::config::{AppConfig, RateLimitBackend};
use axum_backend_template::app::{AppState, WorkerConfig, spawn_worker};
use axum_backend_template::domain::{CacheStore, Password};
use axum_backend_template::infra::observability::{init_metrics, init_tracing, install_panic_hook};
use axum_backend_template::infra::{
    BcryptHasher, JwtManager, NoopCache, PostgresClient, PostgresConfig, RedisCache, RedisConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments use the environment
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    init_tracing(
        config.environment.is_production(),
        config.default_log_directive(),
    )?;
    install_panic_hook();

    info!(environment = ?config.environment, "Starting application");
    if config.auth.using_dev_secret {
        warn!("JWT_SECRET not set, using the built-in development secret");
    }

    let metrics = init_metrics().context("failed to install metrics recorder")?;

    let db = PostgresClient::new(
        config.database.url.expose_secret(),
        PostgresConfig {
            max_connections: config.database.max_connections,
            min_connections: config.database.min_connections,
            acquire_timeout: config.database.acquire_timeout,
            ..PostgresConfig::default()
        },
    )
    .await
    .context("failed to connect to PostgreSQL")?;
    db.run_migrations().await.context("migrations failed")?;
    let db = Arc::new(db);

    let cache: Arc<dyn CacheStore> = match RedisCache::connect(
        config.cache.url.expose_secret(),
        RedisConfig {
            connect_timeout: config.cache.connect_timeout,
            op_timeout: config.cache.op_timeout,
        },
    )
    .await
    {
        Ok(redis) => Arc::new(redis),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, running without cache");
            Arc::new(NoopCache)
        }
    };

    let hasher = Arc::new(BcryptHasher::new(config.auth.bcrypt_cost)?);
    let tokens = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl,
    )?);

    let app_state = Arc::new(AppState::new(
        db,
        Arc::clone(&cache),
        hasher,
        tokens.clone(),
        config.cache.ttl,
    ));

    if let Some(password) = &config.auth.seed_admin_password {
        let password = Password::new(password.expose_secret());
        if let Some(admin) = app_state.users.seed_admin(password).await? {
            info!(user_id = admin.id, "Seeded admin account");
        }
    }

    let mut sweeper = None;
    let rate_limit = if config.rate_limit.enabled {
        let state = Arc::new(RateLimitState::new(
            config.rate_limit.clone(),
            Arc::clone(&cache),
            tokens,
        )?);
        if config.rate_limit.backend == RateLimitBackend::Memory {
            sweeper = Some(spawn_worker(
                state.clone(),
                WorkerConfig {
                    poll_interval: config.rate_limit.sweep_interval,
                    enabled: true,
                },
            ));
        }
        info!(
            max_requests = config.rate_limit.max_requests,
            window = ?config.rate_limit.window,
            backend = ?config.rate_limit.backend,
            "Rate limiting enabled"
        );
        Some(state)
    } else {
        info!("Rate limiting disabled");
        None
    };

    let router = create_router(
        app_state,
        RouterConfig {
            request_timeout: config.server.request_timeout,
            cors_allowed_origins: config.server.cors_allowed_origins.clone(),
            rate_limit,
            metrics: Some(metrics),
        },
    );

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some((handle, shutdown_tx)) = sweeper {
        let _ = shutdown_tx.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "Rate limit sweeper did not stop cleanly");
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
