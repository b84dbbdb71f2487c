//! Party room binary entrypoint wiring REST, WebSocket and SSE layers over
//! the in-process room store.

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::Router;
use party_room::{
    config::AppConfig,
    routes,
    services::room_service,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);
    match room_service::resume_remembered(&app_state).await {
        Ok(Some(room)) => info!(
            room = %room.code,
            join_url = %room.join_url,
            host_token = %room.host_token,
            "resumed hosted room"
        ),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "could not resume the remembered room"),
    }
    let app = build_router(app_state);

    let addr = listen_addr();
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Listen on every interface, on `PORT` or `SERVER_PORT` (default 8080).
fn listen_addr() -> SocketAddr {
    let port = ["PORT", "SERVER_PORT"]
        .into_iter()
        .find_map(|key| env::var(key).ok()?.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
