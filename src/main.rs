//! Form Drafts Backend
//!
//! A local-first draft persistence and hydration service for multi-section editor forms,
//! with SQLite-backed durable storage.

mod api;
mod auth;
mod config;
mod db;
mod drafts;
mod errors;
mod forms;
mod models;
mod reaper;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::SqliteDraftStorage;
use drafts::DraftStore;
use forms::FormSessions;
use reaper::RoleChangeReaper;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DraftStore>,
    pub sessions: Arc<FormSessions>,
    pub reaper: Arc<RoleChangeReaper>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<DraftStore>, config: Config) -> Self {
        Self {
            sessions: Arc::new(FormSessions::new(store.clone())),
            reaper: Arc::new(RoleChangeReaper::new(store.clone())),
            store,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Form Drafts Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Storage entry: {}", config.storage_name);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (DRAFTS_API_PSK). Authentication is disabled!");
    }

    // Open durable storage and load persisted drafts
    let (store, storage) = if config.in_memory() {
        tracing::warn!("In-memory mode: drafts will not survive a restart");
        (Arc::new(DraftStore::in_memory()), None)
    } else {
        let pool = db::init_database(&config.db_path).await?;
        let storage = Arc::new(SqliteDraftStorage::open(pool, config.storage_name.clone()).await?);
        (Arc::new(DraftStore::open(storage.clone())), Some(storage))
    };
    if store.is_empty() {
        tracing::info!("No persisted drafts found");
    } else {
        tracing::info!("Loaded {} drafts", store.len());
    }

    let state = AppState::new(store, config.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(storage) = storage {
        tracing::info!("Flushing drafts before exit");
        storage.flush().await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Drafts
        .route(
            "/drafts",
            get(api::list_drafts).delete(api::clear_drafts),
        )
        .route(
            "/drafts/{key}",
            get(api::get_draft)
                .put(api::put_draft)
                .delete(api::delete_draft),
        )
        .route("/keys", get(api::role_keys))
        // Form sessions
        .route("/forms", post(api::mount_form))
        .route(
            "/forms/{id}",
            get(api::get_form)
                .put(api::set_all)
                .delete(api::unmount_form),
        )
        .route("/forms/{id}/server-data", post(api::deliver_server_data))
        .route("/forms/{id}/fields/{field}", put(api::set_field))
        .route("/forms/{id}/nested", patch(api::set_nested))
        .route("/forms/{id}/saved", post(api::mark_saved))
        // Navigation
        .route("/navigation", post(api::route_changed))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
