//! Milestone handlers: ranking lines and score growth at fixed ranks.

use axum::extract::{OriginalUri, Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use super::{ensure_event, memoized};
use crate::api::dto::{RankingLineDto, ScoreGrowthDto};
use crate::app_state::AppState;
use crate::domain::{NORMAL_RANKING_LINES, ServerRegion, WORLD_BLOOM_RANKING_LINES};
use crate::error::{ErrorResponse, TrackerError};
use crate::persistence::RankingStore;

async fn lines(
    store: &RankingStore,
    server: ServerRegion,
    event_id: i64,
    character_id: Option<i64>,
) -> Result<Vec<RankingLineDto>, TrackerError> {
    ensure_event(store, server, event_id).await?;
    let ranks = if character_id.is_some() {
        WORLD_BLOOM_RANKING_LINES
    } else {
        NORMAL_RANKING_LINES
    };
    let lines = store.ranking_lines(event_id, character_id, ranks).await?;
    if lines.is_empty() {
        return Err(TrackerError::NotFound("no ranking lines recorded".to_string()));
    }
    Ok(lines.into_iter().map(RankingLineDto::from).collect())
}

async fn growth(
    store: &RankingStore,
    server: ServerRegion,
    event_id: i64,
    character_id: Option<i64>,
    interval_secs: i64,
) -> Result<Vec<ScoreGrowthDto>, TrackerError> {
    if interval_secs <= 0 {
        return Err(TrackerError::InvalidRequest(format!(
            "interval must be positive, got {interval_secs}"
        )));
    }
    ensure_event(store, server, event_id).await?;
    let ranks = if character_id.is_some() {
        WORLD_BLOOM_RANKING_LINES
    } else {
        NORMAL_RANKING_LINES
    };
    let since = Utc::now().timestamp().saturating_sub(interval_secs);
    let growths = store
        .score_growth(event_id, character_id, ranks, since)
        .await?;
    if growths.is_empty() {
        return Err(TrackerError::NotFound(format!(
            "no score growth in the last {interval_secs}s"
        )));
    }
    Ok(growths.into_iter().map(ScoreGrowthDto::from).collect())
}

/// `GET /event/{server}/{event_id}/ranking-lines`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when no milestone rank was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/ranking-lines",
    tag = "Lines",
    summary = "Ranking lines",
    description = "Returns the latest score at each milestone rank of the main leaderboard.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
    ),
    responses(
        (status = 200, description = "Milestone scores", body = Vec<RankingLineDto>),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn ranking_lines(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(&state, server, &uri, lines(store, server, event_id, None)).await
}

/// `GET /event/{server}/{event_id}/ranking-score-growth/interval/{interval}`
///
/// # Errors
///
/// Returns [`TrackerError::InvalidRequest`] for a non-positive interval,
/// [`TrackerError::UnknownServer`] for a server that is not enabled and
/// [`TrackerError::NotFound`] when no rank has two rows inside the window.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/ranking-score-growth/interval/{interval}",
    tag = "Lines",
    summary = "Score growth",
    description = "Returns the score gained at each milestone rank over the last `interval` seconds.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("interval" = i64, Path, description = "Window length in seconds"),
    ),
    responses(
        (status = 200, description = "Milestone growth", body = Vec<ScoreGrowthDto>),
        (status = 400, description = "Unknown server or bad interval", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn ranking_score_growth(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, interval)): Path<(String, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        growth(store, server, event_id, None, interval),
    )
    .await
}

/// `GET /event/{server}/{event_id}/world-bloom-ranking-lines/character/{character_id}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when no milestone rank was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/world-bloom-ranking-lines/character/{character_id}",
    tag = "WorldBloom",
    summary = "Chapter ranking lines",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("character_id" = i64, Path, description = "Chapter character"),
    ),
    responses(
        (status = 200, description = "Milestone scores", body = Vec<RankingLineDto>),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn chapter_ranking_lines(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, character_id)): Path<(String, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        lines(store, server, event_id, Some(character_id)),
    )
    .await
}

/// `GET /event/{server}/{event_id}/world-bloom-ranking-score-growth/character/{character_id}/interval/{interval}`
///
/// # Errors
///
/// Returns [`TrackerError::InvalidRequest`] for a non-positive interval,
/// [`TrackerError::UnknownServer`] for a server that is not enabled and
/// [`TrackerError::NotFound`] when no rank has two rows inside the window.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/world-bloom-ranking-score-growth/character/{character_id}/interval/{interval}",
    tag = "WorldBloom",
    summary = "Chapter score growth",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("character_id" = i64, Path, description = "Chapter character"),
        ("interval" = i64, Path, description = "Window length in seconds"),
    ),
    responses(
        (status = 200, description = "Milestone growth", body = Vec<ScoreGrowthDto>),
        (status = 400, description = "Unknown server or bad interval", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn chapter_score_growth(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, character_id, interval)): Path<(String, i64, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        growth(store, server, event_id, Some(character_id), interval),
    )
    .await
}

/// Milestone routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/event/{server}/{event_id}/ranking-lines", get(ranking_lines))
        .route(
            "/event/{server}/{event_id}/ranking-score-growth/interval/{interval}",
            get(ranking_score_growth),
        )
        .route(
            "/event/{server}/{event_id}/world-bloom-ranking-lines/character/{character_id}",
            get(chapter_ranking_lines),
        )
        .route(
            "/event/{server}/{event_id}/world-bloom-ranking-score-growth/character/{character_id}/interval/{interval}",
            get(chapter_score_growth),
        )
}
