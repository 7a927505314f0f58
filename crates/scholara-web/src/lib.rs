//! REST backend for Scholara Collective.
//!
//! Serves the subject catalogue, resource uploads with text extraction,
//! contributor analytics, user/auth endpoints, and two proxy routes that
//! keep the search and generative AI credentials on the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;
pub mod upload;

use config::ServerConfig;
use scholara_store::Store;
use state::AppState;

/// Multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// All `/api` routes, without middleware.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/subjects",
            get(handlers::subjects::list).post(handlers::subjects::create),
        )
        .route(
            "/api/search-proxy",
            get(handlers::search::search_proxy),
        )
        .route(
            "/api/gemini-proxy",
            post(handlers::gemini::gemini_proxy),
        )
        .route(
            "/api/analytics/contributors",
            get(handlers::analytics::contributors),
        )
        .route("/api/user/me", get(handlers::user::me))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/setup-admin", post(handlers::auth::setup_admin))
        .route(
            "/api/resources",
            get(handlers::resources::list).post(handlers::resources::upload),
        )
        .route("/api/resources/{id}", get(handlers::resources::detail))
        .route(
            "/api/resources/{id}/ratings",
            post(handlers::resources::rate),
        )
        .fallback(handlers::not_found)
}

/// The full application.
pub fn app(state: Arc<AppState>) -> Router {
    layered(api_routes(), state)
}

/// Wrap `routes` in the error envelope, panic catching, body limit,
/// request tracing, and CORS.
pub fn layered(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes + FORM_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    routes
        // Innermost first: panics become error responses before the
        // envelope renders them.
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::error_envelope,
        ))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the store, bind, and serve until Ctrl+C or SIGTERM.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    info!(path = %config.database_path.display(), "Opening store...");
    let store = Store::open(&config.database_path)?;
    let state = AppState::new(config, store)?;

    let address = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
