//! Ranking DTOs returned by the event query endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::{PlayerIdentityRecord, RankingLine, RankingRecord, ScoreGrowth};

/// One recorded ranking row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankingRecordDto {
    /// Cycle timestamp in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Cycle timestamp as RFC 3339.
    pub recorded_at: Option<DateTime<Utc>>,
    /// Upstream user id.
    pub user_id: String,
    /// Event points.
    pub score: i64,
    /// Leaderboard position.
    pub rank: i64,
    /// Chapter character, present for WorldBloom chapter rows only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<i64>,
}

impl From<RankingRecord> for RankingRecordDto {
    fn from(record: RankingRecord) -> Self {
        Self {
            recorded_at: record.recorded_at(),
            timestamp: record.timestamp,
            user_id: record.user_id,
            score: record.score,
            rank: record.rank,
            character_id: record.character_id,
        }
    }
}

/// Latest known identity of a player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentityDto {
    /// Upstream user id.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Cheerful Carnival team, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheerful_team_id: Option<i64>,
}

impl From<PlayerIdentityRecord> for IdentityDto {
    fn from(record: PlayerIdentityRecord) -> Self {
        Self {
            user_id: record.user_id,
            name: record.name,
            cheerful_team_id: record.cheerful_team_id,
        }
    }
}

/// Response body of the `latest-*` endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LatestRankingResponse {
    /// Newest matching row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_data: Option<RankingRecordDto>,
    /// Identity of the row's user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<IdentityDto>,
}

/// Response body of the `trace-*` endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankingTraceResponse {
    /// Every matching row, oldest first.
    pub rank_data: Vec<RankingRecordDto>,
    /// Identity of the traced user, for user traces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<IdentityDto>,
}

/// Latest score at one milestone rank.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankingLineDto {
    /// Milestone rank.
    pub rank: i64,
    /// Score at that rank.
    pub score: i64,
    /// User holding the rank.
    pub user_id: String,
    /// Cycle timestamp in seconds.
    pub timestamp: i64,
}

impl From<RankingLine> for RankingLineDto {
    fn from(line: RankingLine) -> Self {
        Self {
            rank: line.rank,
            score: line.score,
            user_id: line.user_id,
            timestamp: line.timestamp,
        }
    }
}

/// Score movement at one milestone rank.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreGrowthDto {
    /// Milestone rank.
    pub rank: i64,
    /// Earliest cycle inside the window.
    pub timestamp_earlier: i64,
    /// Score at the earliest cycle.
    pub score_earlier: i64,
    /// Latest cycle inside the window.
    pub timestamp_latest: i64,
    /// Score at the latest cycle.
    pub score_latest: i64,
    /// Points gained inside the window.
    pub growth: i64,
}

impl From<ScoreGrowth> for ScoreGrowthDto {
    fn from(growth: ScoreGrowth) -> Self {
        Self {
            rank: growth.rank,
            timestamp_earlier: growth.timestamp_earlier,
            score_earlier: growth.score_earlier,
            timestamp_latest: growth.timestamp_latest,
            score_latest: growth.score_latest,
            growth: growth.growth,
        }
    }
}
