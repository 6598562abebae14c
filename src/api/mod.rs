//! Administrative REST API and live WebSocket endpoint
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET|POST /api/v1/targets` - List or register targets
//! - `GET|PATCH|DELETE /api/v1/targets/:id` - Single target
//! - `GET /api/v1/targets/:id/checks` - Recent check outcomes
//! - `POST /api/v1/monitoring/run-check` - Run one check cycle now
//! - `POST /api/v1/monitoring/start-background` - Start the recurring checker
//! - `GET /api/v1/monitoring/status` - Scheduler status
//! - `WS /api/v1/ws/monitoring` - Live event stream

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod middleware;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;
#[cfg(feature = "api")]
pub mod websocket;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{
    ChecksResponse, HealthResponse, RunCheckResponse, StartResponse, StatusResponse,
    TargetsResponse,
};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_addr: SocketAddr,

    /// Optional authentication token
    pub auth_token: Option<String>,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            auth_token: None,
            enable_cors: true,
        }
    }
}

impl From<&crate::config::Config> for ApiConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            bind_addr: config.bind,
            auth_token: config.auth_token.clone(),
            enable_cors: config.enable_cors,
        }
    }
}

/// Build the router with all routes and layers
#[cfg(feature = "api")]
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/targets",
            get(routes::targets::list_targets).post(routes::targets::create_target),
        )
        .route(
            "/api/v1/targets/:id",
            get(routes::targets::get_target)
                .patch(routes::targets::update_target)
                .delete(routes::targets::delete_target),
        )
        .route(
            "/api/v1/targets/:id/checks",
            get(routes::targets::get_target_checks),
        )
        .route(
            "/api/v1/monitoring/run-check",
            post(routes::monitoring::run_check),
        )
        .route(
            "/api/v1/monitoring/start-background",
            post(routes::monitoring::start_background),
        )
        .route("/api/v1/monitoring/status", get(routes::monitoring::status))
        .route("/api/v1/ws/monitoring", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
