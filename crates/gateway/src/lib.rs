//! HTTP chat surface for careerchat.
//!
//! A thin axum layer over [`ChatService`]: every request maps onto
//! `handle_turn` or `end_session`, and no internal error text reaches the
//! client.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, extract::State, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use careerchat_agent::ChatService;
use careerchat_config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: Arc<ChatService>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: health check plus the v1 API.
///
/// Layers applied:
/// - CORS limited to `allowed_origins` (same-origin only when empty)
/// - Request body size limit (64 KB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Serve the chat API until the process is stopped.
pub async fn serve(service: Arc<ChatService>, config: &GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(Arc::new(GatewayState { service }), &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub context_version: String,
    pub tools: Vec<String>,
    pub sessions: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        context_version: state.service.context().version.clone(),
        tools: state
            .service
            .enabled_tools()
            .into_iter()
            .map(|k| k.name().to_string())
            .collect(),
        sessions: state.service.live_sessions().await,
    })
}
