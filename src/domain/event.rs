//! Event lifecycle types.
//!
//! An event moves monotonically through
//! `NotStarted -> Ongoing -> Aggregating -> Ended`. WorldBloom events
//! additionally carry one chapter per character, each with its own phase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ServerRegion;
use crate::error::TrackerError;

/// Grace window after `aggregateAt` (and after `closedAt`) in milliseconds.
pub const AGGREGATION_GRACE_MS: i64 = 600_000;

/// Event format. Only [`EventType::WorldBloom`] has chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Single leaderboard.
    Marathon,
    /// Single leaderboard with team affiliation per player.
    CheerfulCarnival,
    /// Main leaderboard plus one chapter leaderboard per character.
    WorldBloom,
}

impl EventType {
    /// Wire name as it appears in master data.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Marathon => "marathon",
            Self::CheerfulCarnival => "cheerful_carnival",
            Self::WorldBloom => "world_bloom",
        }
    }

    /// Whether this event type carries per-character chapters.
    #[must_use]
    pub const fn has_chapters(&self) -> bool {
        matches!(self, Self::WorldBloom)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "marathon" => Ok(Self::Marathon),
            "cheerful_carnival" => Ok(Self::CheerfulCarnival),
            "world_bloom" => Ok(Self::WorldBloom),
            other => Err(TrackerError::MasterData(format!(
                "unknown event type: {other}"
            ))),
        }
    }
}

/// Lifecycle phase of an event or chapter.
///
/// The derived ordering follows lifecycle progression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    /// Before the start timestamp.
    NotStarted,
    /// Scores are accumulating.
    Ongoing,
    /// Scores are frozen while the final results settle.
    Aggregating,
    /// Final results are available.
    Ended,
}

/// Timestamps of an event, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    /// Start of the event.
    pub start_at: i64,
    /// Score freeze.
    pub aggregate_at: i64,
    /// Official close.
    pub closed_at: i64,
}

impl EventWindow {
    /// Creates a window from raw master-data timestamps.
    #[must_use]
    pub const fn new(start_at: i64, aggregate_at: i64, closed_at: i64) -> Self {
        Self {
            start_at,
            aggregate_at,
            closed_at,
        }
    }

    /// Whether the event counts as live at `now_ms`.
    ///
    /// Live spans `[start_at, closed_at + grace)`, so an event that just
    /// closed is still picked up for its final record.
    #[must_use]
    pub const fn is_live(&self, now_ms: i64) -> bool {
        self.start_at <= now_ms && now_ms < self.closed_at.saturating_add(AGGREGATION_GRACE_MS)
    }

    /// Phase at `now_ms`.
    ///
    /// Aggregating covers `[aggregate_at, min(aggregate_at + grace, closed_at))`.
    /// Every instant maps to exactly one phase and the mapping never moves
    /// backwards as time advances.
    #[must_use]
    pub fn phase_at(&self, now_ms: i64) -> EventPhase {
        let aggregation_end = self
            .aggregate_at
            .saturating_add(AGGREGATION_GRACE_MS)
            .min(self.closed_at);
        if now_ms < self.start_at {
            EventPhase::NotStarted
        } else if now_ms < self.aggregate_at {
            EventPhase::Ongoing
        } else if now_ms < aggregation_end {
            EventPhase::Aggregating
        } else {
            EventPhase::Ended
        }
    }
}

/// Timestamps of one WorldBloom chapter, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterWindow {
    /// Chapter start.
    pub chapter_start_at: i64,
    /// Chapter score freeze.
    pub aggregate_at: i64,
    /// Chapter end.
    pub chapter_end_at: i64,
}

impl ChapterWindow {
    /// Phase of the chapter at `now_ms`.
    #[must_use]
    pub const fn phase_at(&self, now_ms: i64) -> EventPhase {
        if now_ms >= self.chapter_end_at {
            EventPhase::Ended
        } else if now_ms >= self.aggregate_at {
            EventPhase::Aggregating
        } else if now_ms >= self.chapter_start_at {
            EventPhase::Ongoing
        } else {
            EventPhase::NotStarted
        }
    }
}

/// Phase of one character chapter inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChapterSnapshot {
    /// Character the chapter belongs to.
    pub character_id: i64,
    /// Phase at snapshot time.
    pub phase: EventPhase,
}

/// Live event as derived from master data at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSnapshot {
    /// Server the snapshot was taken for.
    pub server: ServerRegion,
    /// Event identifier.
    pub event_id: i64,
    /// Event format.
    pub event_type: EventType,
    /// Phase at snapshot time.
    pub phase: EventPhase,
    /// Asset bundle name from master data.
    pub assetbundle_name: String,
    /// Seconds until aggregation while the event is ongoing.
    pub remaining_secs: Option<i64>,
    /// Localized form of `remaining_secs`.
    pub remaining_label: Option<String>,
    /// Chapters ordered by ascending character id. Empty unless WorldBloom.
    pub chapters: Vec<ChapterSnapshot>,
    /// Raw master-data entry.
    pub detail: serde_json::Value,
}

impl EventSnapshot {
    /// Returns the chapter for `character_id`, if any.
    #[must_use]
    pub fn chapter(&self, character_id: i64) -> Option<&ChapterSnapshot> {
        self.chapters.iter().find(|c| c.character_id == character_id)
    }
}
