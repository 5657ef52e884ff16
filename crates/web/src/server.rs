//! Web server implementation

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use conveyor_common::{ConveyorApi, HttpConveyorApi, PanelConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{forms, views};

/// Shared state handed to every handler
pub struct PanelState {
    pub api: Arc<dyn ConveyorApi>,
    pub config: PanelConfig,
}

pub type SharedState = Arc<PanelState>;

/// Plan panel HTTP service
pub struct WebServer {
    state: SharedState,
}

impl WebServer {
    /// Create a server over an existing backend API
    pub fn new(api: Arc<dyn ConveyorApi>, config: PanelConfig) -> Self {
        if config.web.auth_token.is_none() {
            warn!("CONVEYOR_WEB_AUTH_TOKEN not set; plan API is unauthenticated");
        }
        Self {
            state: Arc::new(PanelState { api, config }),
        }
    }

    /// Create a server talking HTTP to the configured backend
    pub fn from_config(config: PanelConfig) -> conveyor_common::Result<Self> {
        let api = HttpConveyorApi::new(&config.backend)?;
        Ok(Self::new(Arc::new(api), config))
    }

    /// Create router
    pub fn router(&self) -> Router {
        let state = self.state.clone();
        let auth_layer = middleware::from_fn(move |req, next| {
            let state = state.clone();
            async move { auth_middleware(state, req, next).await }
        });

        let protected_routes = Router::new()
            .route("/api/plans", get(views::index_handler))
            .route("/api/plans/clone", get(views::clone_handler).post(forms::clone_handler))
            .route(
                "/api/plans/migrate",
                get(views::migrate_handler).post(forms::migrate_handler),
            )
            .route("/api/plans/import", post(forms::import_handler))
            .route("/api/plans/topology/local", post(views::local_topology_handler))
            .route("/api/plans/topology/global", post(views::global_topology_handler))
            .route(
                "/api/plans/:plan_id",
                get(views::detail_handler).delete(forms::delete_handler),
            )
            .route(
                "/api/plans/:plan_id/incremental_clone",
                get(views::incremental_clone_handler),
            )
            .route(
                "/api/plans/:plan_id/incremental_migrate",
                get(views::incremental_migrate_handler),
            )
            .route(
                "/api/plans/:plan_id/save",
                get(views::save_handler).post(forms::save_handler),
            )
            .route(
                "/api/plans/:plan_id/modify",
                get(views::modify_handler).post(forms::modify_handler),
            )
            .route(
                "/api/plans/:plan_id/destination",
                get(views::destination_handler).post(forms::destination_handler),
            )
            .route("/api/plans/:plan_id/export", get(views::export_handler))
            .route("/api/plans/:plan_id/cancel", post(forms::cancel_handler))
            .route(
                "/api/plans/:plan_id/update_resource",
                post(forms::update_resource_handler),
            )
            .route(
                "/api/plans/:plan_id/generate_template",
                post(forms::generate_template_handler),
            )
            .layer(auth_layer)
            .with_state(self.state.clone());

        Router::new()
            .route("/api/health", get(health_handler))
            .merge(protected_routes)
            .fallback(not_found_handler)
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!(
            "Plan panel starting on http://{} (backend: {})",
            addr, self.state.config.backend.endpoint
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

pub async fn serve(addr: SocketAddr, config: PanelConfig) -> anyhow::Result<()> {
    let server = WebServer::from_config(config)?;
    server.serve(addr).await
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "conveyor-panel",
        "version": conveyor_common::VERSION,
        "backend": state.config.backend.endpoint,
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "not found"})))
}

async fn auth_middleware(state: SharedState, req: Request, next: middleware::Next) -> Response {
    let Some(expected) = state.config.web.auth_token.as_deref() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if provided.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "missing bearer token"})),
        )
            .into_response();
    }

    if provided != expected {
        warn!(path = %req.uri().path(), "rejected panel request with invalid token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid token"})),
        )
            .into_response();
    }

    next.run(req).await
}
