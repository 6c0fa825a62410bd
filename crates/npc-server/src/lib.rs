//! # npc-server
//!
//! HTTP API for the NPC runtime:
//!
//! - NPC registration, lookup and per-tick inference (`/npc/*`)
//! - Session tool registration for the game engine (`/tools/*`)
//! - A debug console exposing scratchpad memory (`/console/*`)
//!
//! Every error is returned as a JSON [`ErrorResponse`](error::ErrorResponse).

pub mod error;
pub mod middleware;
pub mod npc;
pub mod state;
pub mod tools;

use std::future::Future;
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::Uri,
    response::Json,
    routing::{get, post},
};
use npc_config::schema::ServerConfig;
use npc_core::NpcError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::{ApiError, ErrorResponse};
pub use middleware::RequestId;
pub use state::AppState;

const BANNER: &str = "LLM NPC Backend is running!";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub model: String,
    pub npcs: usize,
    pub sessions: usize,
    pub uptime_secs: u64,
}

/// Build the router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/npc/register", post(npc::register))
        .route("/npc/act", post(npc::act))
        .route("/npc/list", get(npc::list))
        .route("/npc/{id}", get(npc::get).delete(npc::delete))
        .route("/tools/register", post(tools::register))
        .route(
            "/tools/session/{id}",
            get(tools::session_info).delete(tools::delete_session),
        )
        .route("/console/scratchpads", get(scratchpads_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .with_state(state)
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(axum::middleware::from_fn(middleware::trace_requests))
        .layer(TraceLayer::new_for_http())
}

async fn root_handler() -> &'static str {
    BANNER
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let provider = state.orchestrator.provider();
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        provider: provider.name().to_string(),
        model: provider.model().to_string(),
        npcs: state.npcs.count(),
        sessions: state.sessions.session_count().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Dump every NPC's scratchpad for the debug console.
async fn scratchpads_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "command": "read_scratchpads",
        "success": true,
        "data": state.scratchpad.snapshot(),
    }))
}

async fn not_found_handler(request_id: RequestId, uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path())).with_request_id(&request_id)
}

async fn method_not_allowed_handler(request_id: RequestId) -> ApiError {
    ApiError::new(
        axum::http::StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed",
        error::METHOD_NOT_ALLOWED,
    )
    .with_request_id(&request_id)
}

/// Serve until `shutdown` resolves. Listens on `config.socket_path` when set
/// (Unix only), otherwise on the TCP address `config.listen`.
pub async fn start_server<F>(
    state: Arc<AppState>,
    config: &ServerConfig,
    shutdown: F,
) -> npc_core::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    if let Some(path) = &config.socket_path {
        #[cfg(unix)]
        return serve_unix(router, path, shutdown).await;

        #[cfg(not(unix))]
        warn!(path = %path.display(), "unix sockets are not supported here, using TCP");
    }

    info!(listen = %config.listen, "starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .map_err(|e| bind_error(&config.listen, e))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

#[cfg(unix)]
async fn serve_unix<F>(router: Router, path: &Path, shutdown: F) -> npc_core::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    remove_stale_socket(path).await;

    info!(socket = %path.display(), "starting HTTP server on unix socket");
    let listener = tokio::net::UnixListener::bind(path)
        .map_err(|e| bind_error(&path.display().to_string(), e))?;

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;
    remove_stale_socket(path).await;
    served?;
    info!("HTTP server stopped");
    Ok(())
}

#[cfg(unix)]
async fn remove_stale_socket(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(socket = %path.display(), "removed socket file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(socket = %path.display(), error = %e, "could not remove socket file"),
    }
}

fn bind_error(addr: &str, e: std::io::Error) -> NpcError {
    NpcError::Io(std::io::Error::new(
        e.kind(),
        format!("failed to bind {addr}: {e}"),
    ))
}
