use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use pp_storage::{InMemoryStore, RocksDbStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

mod config;
mod contexts;
mod hub;

use config::ServiceConfig;
use hub::{ContextHub, SharedStore};

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
    contexts: usize,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) hub: Arc<ContextHub>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;
    let store: SharedStore = match &config.store_path {
        Some(path) => {
            info!("using RocksDB store at {}", path);
            Arc::new(RocksDbStore::open_default(path)?)
        }
        None => {
            info!("PUMP_STORE_PATH not set, keeping state in memory");
            Arc::new(InMemoryStore::default())
        }
    };

    let hub = Arc::new(ContextHub::new(store, config.controller.clone()));
    let reconciler = hub.spawn_reconciler();
    let app = router(AppState { hub });

    info!("pump-service listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    reconciler.abort();
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/contexts", post(contexts::create_context))
        .route("/contexts/{id}", axum::routing::delete(contexts::close_context))
        .route("/contexts/{id}/state", get(contexts::context_state))
        .route("/contexts/{id}/auto-mode", post(contexts::toggle_auto_mode))
        .route("/contexts/{id}/exercise", post(contexts::toggle_exercise))
        .route("/contexts/{id}/exercise/confirm", post(contexts::confirm_exercise))
        .route("/contexts/{id}/exercise/cancel", post(contexts::cancel_exercise))
        .route(
            "/contexts/{id}/store/{key}",
            put(contexts::write_key).delete(contexts::remove_key),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "pump-service",
        status: "ok",
        contexts: state.hub.len().await,
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "pump-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn not_found(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}
