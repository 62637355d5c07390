//! Upstream ranking payloads and their conversion into domain views.
//!
//! Every field is optional on the wire. Items missing the user id, rank,
//! score or name are dropped during conversion.

use serde::Deserialize;

use crate::domain::{ChapterRankings, PlayerRankingEntry, RankingView};

/// One leaderboard item as sent by the upstream API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRankingItem {
    /// Numeric user id.
    pub user_id: Option<u64>,
    /// Display name.
    pub name: Option<String>,
    /// Leaderboard position.
    pub rank: Option<i64>,
    /// Event points.
    pub score: Option<i64>,
    /// Cheerful Carnival affiliation.
    pub user_cheerful_carnival: Option<WireCheerfulCarnival>,
}

/// Cheerful Carnival block of a ranking item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCheerfulCarnival {
    /// Team id.
    pub cheerful_carnival_team_id: Option<i64>,
}

/// Chapter block of the top-100 payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChapterRanking {
    /// Chapter character.
    pub game_character_id: Option<i64>,
    /// Set once the chapter has been aggregated upstream.
    pub is_world_bloom_chapter_aggregate: Option<bool>,
    /// Chapter leaderboard.
    pub rankings: Option<Vec<WireRankingItem>>,
}

/// Chapter block of the border payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChapterBorder {
    /// Chapter character.
    pub game_character_id: Option<i64>,
    /// Set once the chapter has been aggregated upstream.
    pub is_world_bloom_chapter_aggregate: Option<bool>,
    /// Chapter border leaderboard.
    pub border_rankings: Option<Vec<WireRankingItem>>,
}

/// Body of `GET {endpoint}/{server}/event/{id}/ranking-top100`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopRankingResponse {
    /// Main leaderboard, ranks 1..=100.
    pub rankings: Option<Vec<WireRankingItem>>,
    /// Chapter leaderboards.
    pub user_world_bloom_chapter_rankings: Option<Vec<WireChapterRanking>>,
}

/// Body of `GET {endpoint}/{server}/event/{id}/ranking-border`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderRankingResponse {
    /// Main border entries.
    pub border_rankings: Option<Vec<WireRankingItem>>,
    /// Chapter border leaderboards.
    pub user_world_bloom_chapter_ranking_borders: Option<Vec<WireChapterBorder>>,
}

impl WireRankingItem {
    fn into_entry(self, character_id: Option<i64>) -> Option<PlayerRankingEntry> {
        Some(PlayerRankingEntry {
            user_id: self.user_id?.to_string(),
            rank: self.rank?,
            score: self.score?,
            name: self.name?,
            cheerful_team_id: self
                .user_cheerful_carnival
                .and_then(|c| c.cheerful_carnival_team_id),
            character_id,
        })
    }
}

fn entries(items: Option<Vec<WireRankingItem>>, character_id: Option<i64>) -> Vec<PlayerRankingEntry> {
    items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.into_entry(character_id))
        .collect()
}

fn chapter(
    character_id: Option<i64>,
    aggregated: Option<bool>,
    items: Option<Vec<WireRankingItem>>,
) -> Option<ChapterRankings> {
    if aggregated == Some(true) {
        return None;
    }
    let character_id = character_id?;
    Some(ChapterRankings {
        character_id,
        entries: entries(items, Some(character_id)),
    })
}

impl From<TopRankingResponse> for RankingView {
    fn from(response: TopRankingResponse) -> Self {
        Self {
            entries: entries(response.rankings, None),
            chapters: response
                .user_world_bloom_chapter_rankings
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| {
                    chapter(
                        c.game_character_id,
                        c.is_world_bloom_chapter_aggregate,
                        c.rankings,
                    )
                })
                .collect(),
        }
    }
}

impl From<BorderRankingResponse> for RankingView {
    fn from(response: BorderRankingResponse) -> Self {
        Self {
            entries: entries(response.border_rankings, None),
            chapters: response
                .user_world_bloom_chapter_ranking_borders
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| {
                    chapter(
                        c.game_character_id,
                        c.is_world_bloom_chapter_aggregate,
                        c.border_rankings,
                    )
                })
                .collect(),
        }
    }
}
