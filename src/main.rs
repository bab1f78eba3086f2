// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use auth_portal_server::{
    api::router,
    auth::Role,
    config::{AppConfig, ConfigError, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    providers::{github::GithubProvider, ProviderError, ProviderRegistry},
    state::AppState,
    storage::{
        IdentityRepository, KvError, KvStore, MemoryIdentityRepository, MemoryKvStore,
        RepositoryError,
    },
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] KvError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("seeding admin: {0}")]
    Seed(#[from] RepositoryError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    } else {
        let _ = registry.with(tracing_subscriber::fmt::layer()).try_init();
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn KvStore>, StartupError> {
    #[cfg(feature = "redis")]
    if let Some(url) = &config.redis_url {
        let store = auth_portal_server::storage::RedisKvStore::connect(url).await?;
        store.ping().await?;
        info!("using redis store");
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "redis"))]
    if config.redis_url.is_some() {
        warn!("REDIS_URL is set but this build lacks the redis feature; using in-memory store");
    }

    info!(
        capacity = config.memory_store_capacity,
        "using in-memory store (single instance only)"
    );
    Ok(Arc::new(MemoryKvStore::new(config.memory_store_capacity)))
}

fn build_providers(config: &AppConfig) -> Result<ProviderRegistry, StartupError> {
    let mut providers = ProviderRegistry::new();
    if let Some(github) = &config.github {
        providers.register("github", Arc::new(GithubProvider::new(github.clone())?));
    }
    if providers.is_empty() {
        warn!("no OAuth provider configured: only password login is available");
    } else {
        info!(providers = ?providers.names(), "OAuth providers registered");
    }
    Ok(providers)
}

async fn seed_admin(
    config: &AppConfig,
    identities: &MemoryIdentityRepository,
) -> Result<(), StartupError> {
    let Some(seed) = &config.seed_admin else {
        return Ok(());
    };
    match identities.get_by_email(&seed.email).await {
        Ok(_) => Ok(()),
        Err(RepositoryError::NotFound) => {
            identities
                .seed_password_user("Administrator", &seed.email, &seed.password, Role::Admin)
                .await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Cancel `token` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
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
                    error!(error = %e, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        info!("shutdown signal received");
        token.cancel();
    });
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    if config.jwt_secret_is_default {
        warn!("JWT_SECRET not set: using the insecure default signing secret");
    }

    let kv = open_store(&config).await?;
    if config.sessions_outlive_identities() {
        warn!(
            "sessions are stored in redis but identities are in memory: \
             sessions from before a restart or from other instances cannot mint tokens"
        );
    }
    let identities = Arc::new(MemoryIdentityRepository::new());
    seed_admin(&config, &identities).await?;
    let providers = build_providers(&config)?;

    let state = AppState::new(&config, kv, identities, providers);
    let app = router(state, config.request_timeout);

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Auth portal listening (docs at /docs)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await?;

    info!("server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}
