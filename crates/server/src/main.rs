//! GAIA server - composition root: loads configuration, wires the
//! composition layer's [`AppState`], and runs the telnet listener, the
//! WebSocket/HTTP listener, and the tick scheduler side by side.
//!
//! Grounded on `wrldbldr-engine-runner/src/main.rs` (thin `#[tokio::main]`
//! delegating to a `run()`) and `wrldbldr-engine-adapters/src/run/
//! server.rs` (`dotenvy::dotenv()`, `tracing_subscriber` init, background
//! workers joined alongside the HTTP server via `tokio::select!`, a CORS
//! layer built from `AppConfig::cors_allowed_origins`). Exit codes follow
//! the process contract in spec.md §6: 0 normal, 1 fatal startup, 2
//! unrecoverable store error, 3 bind failure.

use std::net::SocketAddr;
use std::process::ExitCode;

use axum::routing::get;
use axum::Router;
use gaia_adapters::{AppConfig, WebSocketState};
use gaia_composition::{bootstrap, BootstrapError};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "gaia=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting GAIA");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            return ExitCode::from(1);
        }
    };

    let state = match bootstrap(&config).await {
        Ok(state) => state,
        Err(err @ BootstrapError::Store(_)) => {
            tracing::error!(error = %err, "unrecoverable store error");
            return ExitCode::from(2);
        }
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            return ExitCode::from(1);
        }
    };

    let telnet_addr = SocketAddr::from(([0, 0, 0, 0], config.telnet_port));
    let telnet_listener = match TcpListener::bind(telnet_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %telnet_addr, "failed to bind telnet listener");
            return ExitCode::from(3);
        }
    };
    tracing::info!(addr = %telnet_addr, "telnet listening");

    let ws_addr = SocketAddr::from(([0, 0, 0, 0], config.websocket_port));
    let ws_listener = match TcpListener::bind(ws_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %ws_addr, "failed to bind WebSocket listener");
            return ExitCode::from(3);
        }
    };
    tracing::info!(addr = %ws_addr, "WebSocket listening");

    let cors_layer = if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        tracing::warn!("CORS configured to allow any origin");
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = config.cors_allowed_origins.iter().filter_map(|origin| origin.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    };

    let ws_state = WebSocketState { pipeline: state.pipeline.clone(), registry: state.registry.clone() };
    let app = Router::new()
        .route("/", get(|| async { "GAIA" }))
        .route("/ws", get(gaia_adapters::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(ws_state);

    let telnet_task = {
        let pipeline = state.pipeline.clone();
        let registry = state.registry.clone();
        tokio::spawn(async move {
            gaia_adapters::telnet::run(telnet_listener, pipeline, registry).await;
        })
    };

    let tick_task = {
        let scheduler = state.tick_scheduler.clone();
        tokio::spawn(async move {
            scheduler.run().await;
        })
    };

    let write_back_task = {
        let cache = state.cache.clone();
        let interval = std::time::Duration::from_secs(config.write_back_interval_secs);
        tokio::spawn(async move {
            cache.run_write_back(interval).await;
        })
    };

    let ws_server = axum::serve(ws_listener, app);
    let shutdown = state.pipeline.shutdown.clone();

    tokio::select! {
        result = ws_server => {
            if let Err(err) = result {
                tracing::error!(error = %err, "WebSocket server error");
            }
        }
        _ = telnet_task => {
            tracing::error!("telnet listener task exited unexpectedly");
        }
        _ = tick_task => {
            tracing::error!("tick scheduler task exited unexpectedly");
        }
        _ = write_back_task => {
            tracing::error!("write-back task exited unexpectedly");
        }
        _ = shutdown.cancelled() => {
            tracing::info!("shutdown requested via admin command");
        }
    }

    ExitCode::SUCCESS
}
