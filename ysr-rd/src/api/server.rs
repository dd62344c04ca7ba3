//! HTTP server setup and routing
//!
//! The reader and admin pages are route groups under `/api/reader` and
//! `/api/admin`; navigation state lives under `/api`. Events stream on
//! `/events`.

use crate::api::{handlers, sse};
use crate::error::{Error, Result};
use crate::state::SharedState;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub port: u16,
}

/// Build the full route table
pub fn build_router(ctx: AppContext) -> Router {
    let reader = Router::new()
        .route("/articles", get(handlers::list_published))
        .route("/articles/:id/open", post(handlers::open_article))
        .route("/article", get(handlers::current_article))
        .route("/close", post(handlers::close_article))
        .route("/segments/:id/play", post(handlers::play_segment))
        .route("/playback", get(handlers::playback_state))
        .route("/playback/stop", post(handlers::stop_playback))
        .route("/playback/speed", post(handlers::set_speed))
        .route("/words/:id/activate", post(handlers::activate_word))
        .route("/click", post(handlers::document_click))
        .route("/popup", get(handlers::popup_state))
        .route("/popup/close", post(handlers::close_popup));

    let admin = Router::new()
        .route(
            "/articles",
            get(handlers::list_all).post(handlers::create_article),
        )
        .route(
            "/articles/:id",
            get(handlers::get_article)
                .put(handlers::update_article)
                .delete(handlers::delete_article),
        )
        .route("/articles/:id/publish", post(handlers::toggle_publish))
        .route(
            "/editor",
            post(handlers::open_editor).delete(handlers::cancel_editor),
        )
        .route("/reload", post(handlers::reload_articles));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/view", get(handlers::get_view))
        .route("/api/navigate", post(handlers::navigate))
        .route("/api/popstate", post(handlers::pop_state))
        .nest("/api/reader", reader)
        .nest("/api/admin", admin)
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = build_router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
