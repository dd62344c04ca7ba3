//! HTTP request handlers
//!
//! Errors map to status codes as follows:
//! - decode failure: 422 (transient warning, playback aborted)
//! - persistence failure: 500 (client shows a blocking alert)
//! - unknown article, segment or word: 404
//! - no article open: 409
//! - audio output failure: 503
//!
//! A segment without audio is not an error: play returns 200 with `no_audio`.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::{ChannelSnapshot, PlayOutcome, PlaybackSpeed};
use crate::reading::{ActivePopup, ClickTarget, PopupActivation, ReadingSurface, Rect};
use crate::router::{query_for, view_from_query, RouterSnapshot};
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use ysr_common::events::View;
use ysr_common::{Article, ArticleDraft, ArticleSummary};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    store: String,
    output: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<StatusResponse>)>;

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    view: View,
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    view: View,
}

#[derive(Debug, Deserialize)]
pub struct PopStateRequest {
    /// Location query string after the history change
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    closed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    outcome: PlayOutcome,
    channel: ChannelSnapshot,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStateResponse {
    sentence: ChannelSnapshot,
    word: ChannelSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    speed: PlaybackSpeed,
}

#[derive(Debug, Deserialize)]
pub struct ActivateWordRequest {
    span: Rect,
    #[serde(default)]
    container: Option<Rect>,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    dismissed: bool,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    id: String,
    is_published: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditorRequest {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditorResponse {
    article: Option<Article>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    count: usize,
}

fn error_response(e: Error) -> (StatusCode, Json<StatusResponse>) {
    let status = match &e {
        Error::DecodeFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotFound(_) | Error::Common(ysr_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::Common(ysr_common::Error::InvalidInput(_)) => {
            StatusCode::BAD_REQUEST
        }
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::AudioOutput(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Common(_) | Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }

    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "ysr-rd".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: ctx.state.router.store_backend().to_string(),
        output: ctx.state.output_name().to_string(),
    })
}

// ============================================================================
// Navigation Endpoints
// ============================================================================

/// GET /api/view - View for a URL query (`?view=admin`), or the current view without one
pub async fn get_view(State(ctx): State<AppContext>, RawQuery(query): RawQuery) -> Json<ViewResponse> {
    let view = match query.as_deref() {
        Some(q) if !q.is_empty() => view_from_query(Some(q)),
        _ => ctx.state.router.view().await,
    };
    Json(ViewResponse {
        view,
        query: query_for(view).to_string(),
    })
}

/// POST /api/navigate - Switch pages and get the URL query to push
pub async fn navigate(
    State(ctx): State<AppContext>,
    Json(req): Json<NavigateRequest>,
) -> Json<RouterSnapshot> {
    Json(ctx.state.navigate(req.view).await)
}

/// POST /api/popstate - Browser history moved
pub async fn pop_state(
    State(ctx): State<AppContext>,
    Json(req): Json<PopStateRequest>,
) -> Json<RouterSnapshot> {
    Json(ctx.state.pop_state(req.query.as_deref()).await)
}

// ============================================================================
// Reader Endpoints
// ============================================================================

/// GET /api/reader/articles - Published article cards, newest first
pub async fn list_published(State(ctx): State<AppContext>) -> Json<Vec<ArticleSummary>> {
    Json(ctx.state.router.published().await)
}

/// POST /api/reader/articles/:id/open - Open an article and count the view
pub async fn open_article(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<ReadingSurface> {
    ctx.state
        .open_article(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /api/reader/article - Currently open article
pub async fn current_article(State(ctx): State<AppContext>) -> ApiResult<ReadingSurface> {
    match ctx.state.router.selected().await {
        Some(article) => Ok(Json(ReadingSurface::build(&article))),
        None => Err(error_response(Error::NotFound("No article is open".to_string()))),
    }
}

/// POST /api/reader/close - Back to the article list
pub async fn close_article(State(ctx): State<AppContext>) -> Json<CloseResponse> {
    Json(CloseResponse {
        closed: ctx.state.close_article().await,
    })
}

/// POST /api/reader/segments/:id/play - Play, or stop if already playing
pub async fn play_segment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<PlayResponse> {
    let outcome = ctx.state.play_segment(&id).await.map_err(error_response)?;
    Ok(Json(PlayResponse {
        outcome,
        channel: ctx.state.sentence.snapshot().await,
    }))
}

/// GET /api/reader/playback - Both channels
pub async fn playback_state(State(ctx): State<AppContext>) -> Json<PlaybackStateResponse> {
    Json(PlaybackStateResponse {
        sentence: ctx.state.sentence.snapshot().await,
        word: ctx.state.popup.word_player().snapshot().await,
    })
}

/// POST /api/reader/playback/stop - Stop the sentence channel
pub async fn stop_playback(State(ctx): State<AppContext>) -> Json<ChannelSnapshot> {
    ctx.state.sentence.stop().await;
    Json(ctx.state.sentence.snapshot().await)
}

/// POST /api/reader/playback/speed - Set sentence speed
pub async fn set_speed(
    State(ctx): State<AppContext>,
    Json(req): Json<SpeedRequest>,
) -> Json<ChannelSnapshot> {
    info!("Speed change requested: {}", req.speed);
    ctx.state.sentence.set_speed(req.speed).await;
    Json(ctx.state.sentence.snapshot().await)
}

/// POST /api/reader/words/:id/activate - Open the popup and pronounce the word
pub async fn activate_word(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<ActivateWordRequest>,
) -> ApiResult<PopupActivation> {
    let article = ctx
        .state
        .router
        .selected()
        .await
        .ok_or_else(|| error_response(Error::InvalidState("No article is open".to_string())))?;
    let item = article
        .vocabulary(&id)
        .ok_or_else(|| error_response(Error::NotFound(format!("Vocabulary item {}", id))))?;

    Ok(Json(
        ctx.state.popup.activate(item, req.span, req.container).await,
    ))
}

/// POST /api/reader/click - Document click; dismisses the popup when outside it
pub async fn document_click(
    State(ctx): State<AppContext>,
    Json(target): Json<ClickTarget>,
) -> Json<ClickResponse> {
    Json(ClickResponse {
        dismissed: ctx.state.popup.handle_click(target).await,
    })
}

/// GET /api/reader/popup - Active popup, if any
pub async fn popup_state(State(ctx): State<AppContext>) -> Json<Option<ActivePopup>> {
    Json(ctx.state.popup.active().await)
}

/// POST /api/reader/popup/close - Close button on the popup
pub async fn close_popup(State(ctx): State<AppContext>) -> Json<ClickResponse> {
    Json(ClickResponse {
        dismissed: ctx.state.popup.close().await,
    })
}

// ============================================================================
// Admin Endpoints
// ============================================================================

/// GET /api/admin/articles - Every article, published or not
pub async fn list_all(State(ctx): State<AppContext>) -> Json<Vec<Article>> {
    Json(ctx.state.router.all_articles().await)
}

/// GET /api/admin/articles/:id
pub async fn get_article(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Article> {
    ctx.state
        .router
        .article(&id)
        .await
        .map(Json)
        .ok_or_else(|| error_response(Error::NotFound(format!("Article {}", id))))
}

/// POST /api/admin/articles - Create (blank id) or upsert
pub async fn create_article(
    State(ctx): State<AppContext>,
    Json(draft): Json<ArticleDraft>,
) -> ApiResult<SaveResponse> {
    let id = ctx
        .state
        .router
        .save_article(draft)
        .await
        .map_err(error_response)?;
    Ok(Json(SaveResponse { id }))
}

/// PUT /api/admin/articles/:id - Update; the path id wins over the body
pub async fn update_article(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(mut draft): Json<ArticleDraft>,
) -> ApiResult<SaveResponse> {
    draft.id = id;
    let id = ctx
        .state
        .router
        .save_article(draft)
        .await
        .map_err(error_response)?;
    Ok(Json(SaveResponse { id }))
}

/// DELETE /api/admin/articles/:id
pub async fn delete_article(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusResponse> {
    ctx.state
        .router
        .delete_article(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// POST /api/admin/articles/:id/publish - Flip publication
pub async fn toggle_publish(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<PublishResponse> {
    let is_published = ctx
        .state
        .router
        .toggle_publish(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(PublishResponse { id, is_published }))
}

/// POST /api/admin/editor - Show the editor (new article without an id)
pub async fn open_editor(
    State(ctx): State<AppContext>,
    Json(req): Json<EditorRequest>,
) -> ApiResult<EditorResponse> {
    let article = ctx
        .state
        .router
        .open_editor(req.id.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(EditorResponse { article }))
}

/// DELETE /api/admin/editor - Hide the editor
pub async fn cancel_editor(State(ctx): State<AppContext>) -> Json<RouterSnapshot> {
    ctx.state.router.cancel_editor().await;
    Json(ctx.state.router.snapshot().await)
}

/// POST /api/admin/reload - Refetch from the store
pub async fn reload_articles(State(ctx): State<AppContext>) -> Json<ReloadResponse> {
    Json(ReloadResponse {
        count: ctx.state.router.load().await,
    })
}
