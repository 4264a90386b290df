use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use braid_core::files::ObjectStore;
use braid_core::identity::Caller;
use braid_engine::{LineageService, MessageService, ThreadService};

use crate::auth::{caller_from_headers, IdentityResolver};
use crate::error::ApiError;
use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 9280 }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub threads: Arc<ThreadService>,
    pub messages: Arc<MessageService>,
    pub lineage: Arc<LineageService>,
    pub objects: Arc<dyn ObjectStore>,
    pub resolver: Arc<dyn IdentityResolver>,
}

/// Per-request identity context. Every operation requires one: a resolved
/// user or a client-supplied anonymous id. Requests with neither are
/// rejected before reaching a handler.
pub struct Identity(pub Caller);

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers, state.resolver.as_ref())
            .await
            .map(Identity)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/threads",
            post(handlers::create_thread).get(handlers::list_threads),
        )
        .route("/threads/branch", post(handlers::branch_thread))
        .route(
            "/threads/{thread_ref}",
            patch(handlers::rename_thread).delete(handlers::delete_thread),
        )
        .route("/threads/{thread_ref}/share", post(handlers::share_thread))
        .route("/threads/{thread_ref}/clone", post(handlers::clone_thread))
        .route("/threads/{thread_ref}/messages", get(handlers::list_messages))
        .route("/messages", post(handlers::create_message))
        .route("/shared/{thread_ref}/messages", get(handlers::list_shared_messages))
        .route("/files/upload-url", post(handlers::create_upload_url))
        .route("/files/{storage_id}/url", get(handlers::resolve_file_url))
        .route("/attachments", get(handlers::list_attachments))
        .route("/promote", post(handlers::promote))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "braid server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the accept loop alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}
