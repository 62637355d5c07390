//! Domain layer: server regions, event lifecycle, ranking data and the
//! shared response cache.
//!
//! This module contains the plain data model every other layer speaks:
//! which server is tracked, which phase an event is in, what an upstream
//! leaderboard view looks like, and the memo the query API reads through.

pub mod event;
pub mod ranking;
pub mod response_cache;
pub mod server_region;

pub use event::{
    AGGREGATION_GRACE_MS, ChapterSnapshot, ChapterWindow, EventPhase, EventSnapshot, EventType,
    EventWindow,
};
pub use ranking::{
    ChapterRankings, NORMAL_RANKING_LINES, PlayerRankingEntry, RankingView,
    TOP_VIEW_BOUNDARY_RANK, WORLD_BLOOM_RANKING_LINES,
};
pub use response_cache::{DEFAULT_RESPONSE_TTL, ResponseCache};
pub use server_region::ServerRegion;
