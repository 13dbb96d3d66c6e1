//! HTTP API gateway for Curator.
//!
//! Two endpoints:
//! - `POST /chat` answers a conversation against the community corpus
//! - `GET /health` reports index size and tool provider connectivity
//!
//! Built on Axum; every request is traced.

pub mod context;

pub use context::{AppContext, StartupError};

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::{
    Router,
    routing::{get, post},
};
use curator_agent::{ChatError, ChatResponse};
use curator_config::AppConfig;
use curator_core::message::ChatRequest;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

type SharedContext = Arc<AppContext>;

/// Build the router over a ready context.
pub fn build_router(context: SharedContext) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(context)
}

/// Build the context, serve until Ctrl-C, then shut the context down.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let context = Arc::new(AppContext::from_config(config).await?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    let served = axum::serve(listener, build_router(context.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    context.shutdown().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Maps request failures onto status codes.
struct ApiError(ChatError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChatError::Authorization(_) => StatusCode::FORBIDDEN,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Generation(e) => {
                error!(error = %e, "Generation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match self.0 {
            ChatError::Authorization(_) => "Community mismatch".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

async fn chat_handler(
    State(context): State<SharedContext>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    context.service.chat(&request).await.map(Json).map_err(ApiError)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    docs_indexed: usize,
    tool_provider_connected: bool,
}

async fn health_handler(State(context): State<SharedContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        docs_indexed: context.docs_indexed(),
        tool_provider_connected: context.tool_provider_connected(),
    })
}
