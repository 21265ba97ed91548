mod config;
mod handlers;
mod middleware;
mod redis;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::middleware::{
    ForceHttps, GuardChain, IpWhitelist, SecurityHeaders, SourcemapSuppression, except,
};
use crate::redis::RedisState;

const MAX_BODY_SIZE: usize = 100 * 1024; // 100KB
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub redis: RedisState,
    pub config: Config,
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    let log_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("app_edge={log_level},tower_http=info").into()
            }),
        )
        .init();

    tracing::debug!(?config, "loaded config");

    let redis = RedisState::connect(&config.redis)
        .await
        .expect("invalid Redis config");
    tracing::info!(
        tls = config.redis.tls.is_some(),
        link = ?redis.link_status().await,
        "redis handle ready"
    );

    let chain = build_guards(&config);
    tracing::info!(
        mode = %config.mode,
        app_domain = config.app_domain,
        public_domain = config.public_domain,
        "request guards configured"
    );

    let state = AppState {
        redis,
        config: config.clone(),
    };
    let app = build_router(state, chain);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    tracing::info!(port = config.port, "app edge starting");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
}

/// Guard order: headers first so every response carries them, then the
/// sourcemap short-circuit, then the redirect and whitelist checks.
fn build_guards(config: &Config) -> GuardChain {
    let whitelist = IpWhitelist::parse(&config.ip_whitelist);
    if whitelist.is_enabled() {
        tracing::info!("ip whitelist enabled");
    }

    GuardChain::new(vec![
        Box::new(SecurityHeaders),
        Box::new(SourcemapSuppression),
        Box::new(except(&["/health"], ForceHttps::from_config(config))),
        Box::new(except(&["/health"], whitelist)),
    ])
}

fn build_router(state: AppState, chain: GuardChain) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    chain,
                    middleware::guard_chain,
                ))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining connections");

    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_TIMEOUT).await;
        tracing::warn!("graceful shutdown timed out, exiting");
        std::process::exit(0);
    });
}
