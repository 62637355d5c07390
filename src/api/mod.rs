//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Event queries are mounted under `/event/{server}/{event_id}`; `/health`
//! sits at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document of the query API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "sekai-event-tracker",
        description = "Recorded event rankings per server: latest rows, history, milestone lines and score growth."
    ),
    paths(
        handlers::system::health_handler,
        handlers::ranking::latest_by_user,
        handlers::ranking::latest_by_rank,
        handlers::ranking::trace_by_user,
        handlers::ranking::trace_by_rank,
        handlers::ranking::latest_chapter_by_user,
        handlers::ranking::latest_chapter_by_rank,
        handlers::ranking::trace_chapter_by_user,
        handlers::ranking::trace_chapter_by_rank,
        handlers::ranking::user_data,
        handlers::lines::ranking_lines,
        handlers::lines::ranking_score_growth,
        handlers::lines::chapter_ranking_lines,
        handlers::lines::chapter_score_growth,
    ),
    components(schemas(
        dto::RankingRecordDto,
        dto::IdentityDto,
        dto::LatestRankingResponse,
        dto::RankingTraceResponse,
        dto::RankingLineDto,
        dto::ScoreGrowthDto,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Rankings", description = "Main leaderboard rows"),
        (name = "WorldBloom", description = "WorldBloom chapter leaderboards"),
        (name = "Lines", description = "Milestone ranks"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::routes())
        .merge(handlers::system::routes())
}
