use anyhow::Result;
use axum::{
    routing::{get, post},
    serve, Router,
};
use gateway_core::{config::AppConfig, runtime::GatewayRuntime};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use server::{
    middleware,
    router::{self, AppState},
};
use std::net::SocketAddr;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGETS: [&str; 3] = ["gateway_core", "server", "tests"];

fn scoped_filter(level: &str) -> EnvFilter {
    let directives: Vec<String> =
        CRATE_TARGETS.iter().map(|target| format!("{target}={level}")).collect();
    EnvFilter::new(format!("warn,{}", directives.join(",")))
}

fn init_logging(config: &AppConfig) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(level) if level == "debug" || level == "trace" => scoped_filter(&level),
        Ok(_) => EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| scoped_filter("debug")),
        Err(_) => scoped_filter(&config.logging.level),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config =
        AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration loading failed: {e}"))?;

    init_logging(&config);
    info!("Starting POKT relay gateway");
    debug!(
        applications_count = config.applications.len(),
        chains_count = config.chains.len(),
        full_node_host = %config.pocket.full_node_host,
        bind_port = config.server.bind_port,
        "Configuration loaded"
    );

    let addr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let runtime = GatewayRuntime::builder()
        .with_config(config.clone())
        .build()
        .map_err(|e| anyhow::anyhow!("Gateway runtime initialization failed: {e}"))?;

    let app = create_app(AppState::from_components(runtime.components()), &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Gateway listening");

    if let Err(e) = serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error occurred");
    }

    runtime.shutdown().await;
    info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown timeout in seconds.
const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(
        "Shutdown signal received, starting graceful shutdown (timeout: {}s)",
        GRACEFUL_SHUTDOWN_TIMEOUT_SECS
    );
}

fn create_app(state: AppState, config: &AppConfig) -> Router {
    let (set_request_id, propagate_request_id) = middleware::create_request_id_layers();
    let (set_request_id_public, propagate_request_id_public) =
        middleware::create_request_id_layers();

    let mut public = Router::new()
        .route("/health", get(router::handle_health))
        .route("/qosnodes", get(router::handle_qos_nodes));
    if config.metrics.enabled {
        public = public.route("/metrics", get(router::handle_metrics));
    }
    let public = public
        .with_state(state.clone())
        .layer(propagate_request_id_public)
        .layer(set_request_id_public);

    let relay = Router::new()
        .route("/relay/{chain_id}", post(router::handle_relay))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(propagate_request_id)
        .layer(set_request_id);

    public.merge(relay)
}
