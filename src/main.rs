// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use perceptia_gateway::{
    api::router,
    config::{ConfigError, GatewayConfig, DEFAULT_RUST_LOG, LOG_FORMAT_ENV},
    health::{Readiness, StoreHealthMonitor},
    proxy::{ProxyError, ServiceProxy},
    session::{RedisSessionStore, SessionStore, SessionStoreError, SigningKey, TokenError},
    state::AppState,
    users::InMemoryUserStore,
};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("unable to install the rustls crypto provider")]
    CryptoProvider,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid session key: {0}")]
    SessionKey(#[from] TokenError),

    #[error("session store: {0}")]
    SessionStore(#[from] SessionStoreError),

    #[error("backend proxy: {0}")]
    Proxy(#[from] ProxyError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_RUST_LOG));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for ctrl-c, then stop background work and drain the server.
async fn shutdown_on_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "unable to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received, draining connections");
    shutdown.cancel();
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Must happen before any TLS configuration is built.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| StartupError::CryptoProvider)?;

    init_tracing();

    let config = GatewayConfig::from_env()?;
    info!(
        environment = ?config.environment,
        listen_addr = %config.listen_addr,
        "=== Perceptia Gateway Starting ==="
    );

    let signing_key = SigningKey::new(config.session_key.as_bytes())?;
    let sessions: Arc<dyn SessionStore> = Arc::new(
        RedisSessionStore::connect(
            &config.redis_address,
            config.session_duration,
            config.store_timeout,
        )
        .await?,
    );
    info!(address = %config.redis_address, "session store connected");

    let aqrest = ServiceProxy::new(&config.aqrest_base_url())?;
    let readiness = Readiness::default();
    let state = AppState::new(
        signing_key,
        sessions.clone(),
        Arc::new(InMemoryUserStore::new()),
        aqrest,
    )
    .with_public_api(config.public_api.clone())
    .with_environment(config.environment)
    .with_readiness(readiness.clone());

    let shutdown = CancellationToken::new();
    let monitor = tokio::spawn(StoreHealthMonitor::new(sessions, readiness).run(shutdown.clone()));

    let tls = RustlsConfig::from_pem_file(&config.tls_cert_path, &config.tls_key_path).await?;

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone(), shutdown.clone()));

    info!(
        "Perceptia Gateway listening on https://{} (docs at /docs)",
        config.listen_addr
    );
    let served = axum_server::bind_rustls(config.listen_addr, tls)
        .handle(handle)
        .serve(router(state).into_make_service_with_connect_info::<SocketAddr>())
        .await;

    shutdown.cancel();
    if let Err(e) = monitor.await {
        error!(error = %e, "store health monitor ended abnormally");
    }
    served?;
    info!("gateway stopped");
    Ok(())
}
