//! Ranking row handlers: latest and trace lookups by user or rank, for the
//! main leaderboard and WorldBloom chapters, plus identity lookup.

use axum::extract::{OriginalUri, Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use super::{ensure_event, memoized};
use crate::api::dto::{IdentityDto, LatestRankingResponse, RankingRecordDto, RankingTraceResponse};
use crate::app_state::AppState;
use crate::domain::ServerRegion;
use crate::error::{ErrorResponse, TrackerError};
use crate::persistence::{RankingFilter, RankingStore};

async fn latest(
    store: &RankingStore,
    server: ServerRegion,
    event_id: i64,
    filter: RankingFilter,
) -> Result<LatestRankingResponse, TrackerError> {
    ensure_event(store, server, event_id).await?;
    let rank_data = store
        .fetch_rankings(event_id, &filter, true)
        .await?
        .into_iter()
        .next();

    let user_id = filter
        .user_id
        .or_else(|| rank_data.as_ref().map(|row| row.user_id.clone()));
    let user_data = match user_id {
        Some(user_id) => store.fetch_identity(event_id, &user_id).await?,
        None => None,
    };

    if rank_data.is_none() && user_data.is_none() {
        return Err(TrackerError::NotFound("no matching ranking".to_string()));
    }
    Ok(LatestRankingResponse {
        rank_data: rank_data.map(RankingRecordDto::from),
        user_data: user_data.map(IdentityDto::from),
    })
}

async fn trace(
    store: &RankingStore,
    server: ServerRegion,
    event_id: i64,
    filter: RankingFilter,
) -> Result<RankingTraceResponse, TrackerError> {
    ensure_event(store, server, event_id).await?;
    let rows = store.fetch_rankings(event_id, &filter, false).await?;
    let user_data = match &filter.user_id {
        Some(user_id) => store.fetch_identity(event_id, user_id).await?,
        None => None,
    };

    if rows.is_empty() && user_data.is_none() {
        return Err(TrackerError::NotFound("no matching ranking".to_string()));
    }
    Ok(RankingTraceResponse {
        rank_data: rows.into_iter().map(RankingRecordDto::from).collect(),
        user_data: user_data.map(IdentityDto::from),
    })
}

/// `GET /event/{server}/{event_id}/latest-ranking/user/{user_id}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/latest-ranking/user/{user_id}",
    tag = "Rankings",
    summary = "Latest ranking of a user",
    description = "Returns the newest recorded main-leaderboard row of the user together with their identity.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("user_id" = String, Path, description = "Upstream user id"),
    ),
    responses(
        (status = 200, description = "Latest ranking", body = LatestRankingResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn latest_by_user(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, user_id)): Path<(String, i64, String)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        latest(store, server, event_id, RankingFilter::user(user_id)),
    )
    .await
}

/// `GET /event/{server}/{event_id}/latest-ranking/rank/{rank}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/latest-ranking/rank/{rank}",
    tag = "Rankings",
    summary = "Latest ranking at a rank",
    description = "Returns the newest recorded main-leaderboard row at the rank and the identity of its holder.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("rank" = i64, Path, description = "Leaderboard position"),
    ),
    responses(
        (status = 200, description = "Latest ranking", body = LatestRankingResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn latest_by_rank(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, rank)): Path<(String, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        latest(store, server, event_id, RankingFilter::rank(rank)),
    )
    .await
}

/// `GET /event/{server}/{event_id}/trace-ranking/user/{user_id}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/trace-ranking/user/{user_id}",
    tag = "Rankings",
    summary = "Ranking history of a user",
    description = "Returns every recorded main-leaderboard row of the user, oldest first.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("user_id" = String, Path, description = "Upstream user id"),
    ),
    responses(
        (status = 200, description = "Ranking history", body = RankingTraceResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn trace_by_user(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, user_id)): Path<(String, i64, String)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        trace(store, server, event_id, RankingFilter::user(user_id)),
    )
    .await
}

/// `GET /event/{server}/{event_id}/trace-ranking/rank/{rank}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/trace-ranking/rank/{rank}",
    tag = "Rankings",
    summary = "Ranking history at a rank",
    description = "Returns every recorded main-leaderboard row at the rank, oldest first.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("rank" = i64, Path, description = "Leaderboard position"),
    ),
    responses(
        (status = 200, description = "Ranking history", body = RankingTraceResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn trace_by_rank(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, rank)): Path<(String, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(
        &state,
        server,
        &uri,
        trace(store, server, event_id, RankingFilter::rank(rank)),
    )
    .await
}

/// `GET /event/{server}/{event_id}/latest-world-bloom-ranking/character/{character_id}/user/{user_id}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/latest-world-bloom-ranking/character/{character_id}/user/{user_id}",
    tag = "WorldBloom",
    summary = "Latest chapter ranking of a user",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("character_id" = i64, Path, description = "Chapter character"),
        ("user_id" = String, Path, description = "Upstream user id"),
    ),
    responses(
        (status = 200, description = "Latest chapter ranking", body = LatestRankingResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn latest_chapter_by_user(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, character_id, user_id)): Path<(String, i64, i64, String)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    let filter = RankingFilter::user(user_id).in_chapter(Some(character_id));
    memoized(&state, server, &uri, latest(store, server, event_id, filter)).await
}

/// `GET /event/{server}/{event_id}/latest-world-bloom-ranking/character/{character_id}/rank/{rank}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/latest-world-bloom-ranking/character/{character_id}/rank/{rank}",
    tag = "WorldBloom",
    summary = "Latest chapter ranking at a rank",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("character_id" = i64, Path, description = "Chapter character"),
        ("rank" = i64, Path, description = "Chapter leaderboard position"),
    ),
    responses(
        (status = 200, description = "Latest chapter ranking", body = LatestRankingResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn latest_chapter_by_rank(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, character_id, rank)): Path<(String, i64, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    let filter = RankingFilter::rank(rank).in_chapter(Some(character_id));
    memoized(&state, server, &uri, latest(store, server, event_id, filter)).await
}

/// `GET /event/{server}/{event_id}/trace-world-bloom-ranking/character/{character_id}/user/{user_id}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/trace-world-bloom-ranking/character/{character_id}/user/{user_id}",
    tag = "WorldBloom",
    summary = "Chapter ranking history of a user",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("character_id" = i64, Path, description = "Chapter character"),
        ("user_id" = String, Path, description = "Upstream user id"),
    ),
    responses(
        (status = 200, description = "Chapter ranking history", body = RankingTraceResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn trace_chapter_by_user(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, character_id, user_id)): Path<(String, i64, i64, String)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    let filter = RankingFilter::user(user_id).in_chapter(Some(character_id));
    memoized(&state, server, &uri, trace(store, server, event_id, filter)).await
}

/// `GET /event/{server}/{event_id}/trace-world-bloom-ranking/character/{character_id}/rank/{rank}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] when nothing was recorded.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/trace-world-bloom-ranking/character/{character_id}/rank/{rank}",
    tag = "WorldBloom",
    summary = "Chapter ranking history at a rank",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("character_id" = i64, Path, description = "Chapter character"),
        ("rank" = i64, Path, description = "Chapter leaderboard position"),
    ),
    responses(
        (status = 200, description = "Chapter ranking history", body = RankingTraceResponse),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "Nothing recorded", body = ErrorResponse),
    )
)]
pub async fn trace_chapter_by_rank(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, character_id, rank)): Path<(String, i64, i64, i64)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    let filter = RankingFilter::rank(rank).in_chapter(Some(character_id));
    memoized(&state, server, &uri, trace(store, server, event_id, filter)).await
}

/// `GET /event/{server}/{event_id}/user-data/{user_id}`
///
/// # Errors
///
/// Returns [`TrackerError::UnknownServer`] for a server that is not enabled
/// and [`TrackerError::NotFound`] for a user never seen in the event.
#[utoipa::path(
    get,
    path = "/event/{server}/{event_id}/user-data/{user_id}",
    tag = "Rankings",
    summary = "Identity of a user",
    description = "Returns the most recently seen name and Cheerful Carnival team of the user.",
    params(
        ("server" = String, Path, description = "Server region"),
        ("event_id" = i64, Path, description = "Event id"),
        ("user_id" = String, Path, description = "Upstream user id"),
    ),
    responses(
        (status = 200, description = "User identity", body = IdentityDto),
        (status = 400, description = "Unknown server", body = ErrorResponse),
        (status = 404, description = "User not seen", body = ErrorResponse),
    )
)]
pub async fn user_data(
    State(state): State<AppState>,
    uri: OriginalUri,
    Path((server, event_id, user_id)): Path<(String, i64, String)>,
) -> Result<impl IntoResponse, TrackerError> {
    let (server, store) = state.store(&server)?;
    memoized(&state, server, &uri, async {
        ensure_event(store, server, event_id).await?;
        store
            .fetch_identity(event_id, &user_id)
            .await?
            .map(IdentityDto::from)
            .ok_or_else(|| TrackerError::NotFound(format!("user {user_id}")))
    })
    .await
}

/// Ranking row routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/event/{server}/{event_id}/latest-ranking/user/{user_id}",
            get(latest_by_user),
        )
        .route(
            "/event/{server}/{event_id}/latest-ranking/rank/{rank}",
            get(latest_by_rank),
        )
        .route(
            "/event/{server}/{event_id}/trace-ranking/user/{user_id}",
            get(trace_by_user),
        )
        .route(
            "/event/{server}/{event_id}/trace-ranking/rank/{rank}",
            get(trace_by_rank),
        )
        .route(
            "/event/{server}/{event_id}/latest-world-bloom-ranking/character/{character_id}/user/{user_id}",
            get(latest_chapter_by_user),
        )
        .route(
            "/event/{server}/{event_id}/latest-world-bloom-ranking/character/{character_id}/rank/{rank}",
            get(latest_chapter_by_rank),
        )
        .route(
            "/event/{server}/{event_id}/trace-world-bloom-ranking/character/{character_id}/user/{user_id}",
            get(trace_chapter_by_user),
        )
        .route(
            "/event/{server}/{event_id}/trace-world-bloom-ranking/character/{character_id}/rank/{rank}",
            get(trace_chapter_by_rank),
        )
        .route(
            "/event/{server}/{event_id}/user-data/{user_id}",
            get(user_data),
        )
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::StatusCode;

    use crate::api::handlers::tests::{get, seeded_state};

    #[tokio::test]
    async fn latest_by_user_includes_identity() {
        let (state, _) = seeded_state().await;
        let (status, body) = get(&state, "/event/jp/7/latest-ranking/user/u2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rank_data"]["score"], 4_300);
        assert_eq!(body["rank_data"]["timestamp"], 1_600);
        assert_eq!(body["user_data"]["name"], "Bob");
        assert!(body["rank_data"].get("character_id").is_none());
    }

    #[tokio::test]
    async fn latest_by_rank_resolves_holder() {
        let (state, _) = seeded_state().await;
        let (status, body) = get(&state, "/event/jp/7/latest-ranking/rank/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rank_data"]["user_id"], "u1");
        assert_eq!(body["user_data"]["name"], "Alice");
    }

    #[tokio::test]
    async fn trace_is_oldest_first() {
        let (state, _) = seeded_state().await;
        let (status, body) = get(&state, "/event/jp/7/trace-ranking/user/u1").await;
        assert_eq!(status, StatusCode::OK);
        let Some(rows) = body["rank_data"].as_array() else {
            panic!("rank_data");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(body["rank_data"][0]["score"], 5_000);
        assert_eq!(body["rank_data"][1]["score"], 5_600);
    }

    #[tokio::test]
    async fn trace_by_rank_has_no_identity() {
        let (state, _) = seeded_state().await;
        let (status, body) = get(&state, "/event/jp/7/trace-ranking/rank/2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("user_data").is_none());
    }

    #[tokio::test]
    async fn chapter_lookups_read_chapter_rows() {
        let (state, _) = seeded_state().await;
        let (status, body) = get(
            &state,
            "/event/jp/7/latest-world-bloom-ranking/character/17/user/u2",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rank_data"]["score"], 1_200);
        assert_eq!(body["rank_data"]["character_id"], 17);

        let (status, body) = get(
            &state,
            "/event/jp/7/trace-world-bloom-ranking/character/17/rank/1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rank_data"][0]["score"], 900);

        let (status, _) = get(
            &state,
            "/event/jp/7/latest-world-bloom-ranking/character/18/rank/1",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_data_lookup() {
        let (state, _) = seeded_state().await;
        let (status, body) = get(&state, "/event/jp/7/user-data/u1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Alice");

        let (status, _) = get(&state, "/event/jp/7/user-data/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
