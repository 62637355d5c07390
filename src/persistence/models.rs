//! Row models for the per-event ranking tables.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PlayerRankingEntry;

/// One `(timestamp, user)` row of a ranking table.
///
/// `character_id` is set for chapter rows and `None` for main rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    /// Cycle timestamp in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Upstream user id.
    pub user_id: String,
    /// Event points.
    pub score: i64,
    /// Leaderboard position.
    pub rank: i64,
    /// Chapter character, for chapter rows.
    pub character_id: Option<i64>,
}

impl RankingRecord {
    /// Cycle timestamp as a UTC date-time.
    #[must_use]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Latest known identity of a player within one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentityRecord {
    /// Upstream user id.
    pub user_id: String,
    /// Most recently seen display name.
    pub name: String,
    /// Most recently seen Cheerful Carnival team.
    pub cheerful_team_id: Option<i64>,
}

/// Latest score at one milestone rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingLine {
    /// Milestone rank.
    pub rank: i64,
    /// Score held at that rank.
    pub score: i64,
    /// User holding the rank.
    pub user_id: String,
    /// Cycle timestamp in seconds.
    pub timestamp: i64,
}

/// Score movement at one milestone rank over a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreGrowth {
    /// Milestone rank.
    pub rank: i64,
    /// Earliest cycle timestamp inside the window.
    pub timestamp_earlier: i64,
    /// Score at the earliest cycle.
    pub score_earlier: i64,
    /// Latest cycle timestamp inside the window.
    pub timestamp_latest: i64,
    /// Score at the latest cycle.
    pub score_latest: i64,
    /// `score_latest - score_earlier`.
    pub growth: i64,
}

/// Row filter for ranking reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingFilter {
    /// Restrict to one user.
    pub user_id: Option<String>,
    /// Restrict to one rank.
    pub rank: Option<i64>,
    /// Read the chapter table for this character instead of the main table.
    pub character_id: Option<i64>,
    /// Only rows with `timestamp >= since`.
    pub since: Option<i64>,
}

impl RankingFilter {
    /// Filter on a single user.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Filter on a single rank.
    #[must_use]
    pub fn rank(rank: i64) -> Self {
        Self {
            rank: Some(rank),
            ..Self::default()
        }
    }

    /// Narrows the filter to one chapter character.
    #[must_use]
    pub const fn in_chapter(mut self, character_id: Option<i64>) -> Self {
        self.character_id = character_id;
        self
    }

    /// Narrows the filter to rows at or after `since`.
    #[must_use]
    pub const fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }
}

/// Everything written by one recording cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleRows {
    /// Main leaderboard rows.
    pub rankings: Vec<RankingRecord>,
    /// Chapter leaderboard rows.
    pub chapter_rankings: Vec<RankingRecord>,
    /// Identity upserts, one per distinct user.
    pub identities: Vec<PlayerIdentityRecord>,
}

impl CycleRows {
    /// Projects merged entries into rows stamped with `timestamp`.
    ///
    /// The first occurrence of a user wins: later duplicates are dropped
    /// from the same table and from the identity set.
    #[must_use]
    pub fn project(
        timestamp: i64,
        rankings: &[PlayerRankingEntry],
        chapter_rankings: &[PlayerRankingEntry],
    ) -> Self {
        let mut rows = Self::default();
        let mut seen_main = HashSet::new();
        let mut seen_chapter = HashSet::new();
        let mut seen_identity = HashSet::new();

        for entry in rankings {
            if seen_main.insert(entry.user_id.as_str()) {
                rows.rankings.push(record(timestamp, entry, None));
            }
            if seen_identity.insert(entry.user_id.as_str()) {
                rows.identities.push(identity(entry));
            }
        }
        for entry in chapter_rankings {
            let Some(character_id) = entry.character_id else {
                continue;
            };
            if seen_chapter.insert((entry.user_id.as_str(), character_id)) {
                rows.chapter_rankings
                    .push(record(timestamp, entry, Some(character_id)));
            }
            if seen_identity.insert(entry.user_id.as_str()) {
                rows.identities.push(identity(entry));
            }
        }
        rows
    }

    /// Whether the cycle produced no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty() && self.chapter_rankings.is_empty()
    }
}

fn record(timestamp: i64, entry: &PlayerRankingEntry, character_id: Option<i64>) -> RankingRecord {
    RankingRecord {
        timestamp,
        user_id: entry.user_id.clone(),
        score: entry.score,
        rank: entry.rank,
        character_id,
    }
}

fn identity(entry: &PlayerRankingEntry) -> PlayerIdentityRecord {
    PlayerIdentityRecord {
        user_id: entry.user_id.clone(),
        name: entry.name.clone(),
        cheerful_team_id: entry.cheerful_team_id,
    }
}
