//! HTTP server: the MCP SSE transport, the REST API, and their shared state.
//!
//! [`serve_http`] opens the database pool, builds the router, and runs until
//! Ctrl-C, then tears every session down so open streams end and graceful
//! shutdown can complete.

pub mod api;
pub mod mcp;
pub mod rpc;
pub mod users;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::config::{LimitsConfig, NotesConfig};
use crate::db::Pool;
use crate::identity::IdentityResolver;
use crate::session::{ConnectionManager, SessionRegistry};
use crate::tools::ToolDispatcher;
use rpc::McpHandler;

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub identity: IdentityResolver,
    pub connections: ConnectionManager,
    pub mcp: McpHandler,
    pub limits: LimitsConfig,
    pub session_max_age: time::Duration,
}

impl AppState {
    pub fn new(pool: Pool, config: &NotesConfig) -> Self {
        let connections = ConnectionManager::new(
            SessionRegistry::new(),
            config.transport.heartbeat(),
            config.transport.channel_capacity,
            config.transport.message_path.clone(),
        )
        .with_write_timeout(config.transport.write_timeout());
        let dispatcher = ToolDispatcher::new(pool.clone(), config.limits.clone());

        Self {
            identity: IdentityResolver::new(pool.clone()),
            mcp: McpHandler::new(dispatcher),
            limits: config.limits.clone(),
            session_max_age: time::Duration::days(config.server.session_max_age_days.max(1)),
            connections,
            pool,
        }
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let message_path = state.connections.message_path().to_string();

    Router::new()
        .route("/mcp", get(mcp::connect))
        .route("/mcp/{api_key}", get(mcp::connect_with_key))
        .route(&message_path, post(mcp::post_message))
        .route("/api/notes", get(api::list_notes).post(api::create_note))
        .route("/api/notes/export", get(api::export_notes))
        .route("/api/notes/import", post(api::import_notes))
        .route(
            "/api/notes/{id}",
            get(api::get_note).put(api::update_note).delete(api::delete_note),
        )
        .route("/api/notes/{id}/toggle-favorite", post(api::toggle_favorite))
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/users/logout", post(users::logout))
        .route("/api/users/current", get(users::current).put(users::update_current))
        .route(
            "/api/admin/users/{id}",
            put(users::admin_update).delete(users::admin_delete),
        )
        .route("/api/system/status", get(api::system_status))
        .route("/health", get(api::health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C.
pub async fn serve_http(config: NotesConfig) -> Result<()> {
    anyhow::ensure!(
        config.transport.message_path.starts_with('/'),
        "transport.message_path must start with '/', got {:?}",
        config.transport.message_path
    );

    let db_path = config.resolved_db_path();
    let pool = Pool::open(&db_path, config.storage.pool_size)?;
    tracing::info!(db = %db_path.display(), pool_size = pool.size(), "database ready");

    let state = AppState::new(pool.clone(), &config);
    let connections = state.connections.clone();
    let app = router(state, config.server.max_body_bytes);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "notes server listening at http://{bind_addr}/mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
            connections.shutdown();
        })
        .await?;

    pool.close();
    tracing::info!("server stopped");
    Ok(())
}
