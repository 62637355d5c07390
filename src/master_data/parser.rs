//! Derives the live event of one server from its master data directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::hashed_file::HashCachedFile;
use super::remaining::format_remaining;
use crate::domain::{
    ChapterSnapshot, ChapterWindow, EventPhase, EventSnapshot, EventType, EventWindow,
    ServerRegion,
};
use crate::error::TrackerError;

/// Event calendar file name inside the master data directory.
pub const EVENTS_FILE: &str = "events.json";

/// WorldBloom chapter calendar file name inside the master data directory.
pub const WORLD_BLOOMS_FILE: &str = "worldBlooms.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEvent {
    id: i64,
    event_type: String,
    start_at: i64,
    aggregate_at: i64,
    closed_at: i64,
    assetbundle_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarChapter {
    event_id: i64,
    #[serde(alias = "characterId")]
    game_character_id: i64,
    chapter_start_at: i64,
    aggregate_at: i64,
    chapter_end_at: i64,
}

/// Reads `events.json` / `worldBlooms.json` for one server.
///
/// Entries that do not carry the expected fields are skipped.
#[derive(Debug)]
pub struct MasterDataParser {
    server: ServerRegion,
    master_dir: PathBuf,
    events: HashCachedFile<Vec<serde_json::Value>>,
    chapters: HashCachedFile<Vec<serde_json::Value>>,
}

impl MasterDataParser {
    /// Creates a parser reading from `master_dir`.
    #[must_use]
    pub fn new(server: ServerRegion, master_dir: impl Into<PathBuf>) -> Self {
        let master_dir = master_dir.into();
        Self {
            server,
            events: HashCachedFile::new(master_dir.join(EVENTS_FILE)),
            chapters: HashCachedFile::new(master_dir.join(WORLD_BLOOMS_FILE)),
            master_dir,
        }
    }

    /// Server this parser belongs to.
    #[must_use]
    pub const fn server(&self) -> ServerRegion {
        self.server
    }

    /// Directory the calendars are read from.
    #[must_use]
    pub fn master_dir(&self) -> &Path {
        &self.master_dir
    }

    /// Returns the live event at `now_ms`, if any.
    ///
    /// The first calendar entry whose live window contains `now_ms` wins.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MasterData`] if a calendar file is missing
    /// or unparseable.
    pub async fn current_event(
        &mut self,
        now_ms: i64,
    ) -> Result<Option<EventSnapshot>, TrackerError> {
        let events = self.events.load().await?;

        for raw in events.iter() {
            let Ok(event) = serde_json::from_value::<CalendarEvent>(raw.clone()) else {
                continue;
            };
            let window = EventWindow::new(event.start_at, event.aggregate_at, event.closed_at);
            if !window.is_live(now_ms) {
                continue;
            }
            let event_type = match event.event_type.parse::<EventType>() {
                Ok(event_type) => event_type,
                Err(e) => {
                    tracing::warn!(server = %self.server, event_id = event.id, error = %e, "skipping live event");
                    continue;
                }
            };

            let phase = window.phase_at(now_ms);
            let remaining_secs =
                (phase == EventPhase::Ongoing).then(|| (event.aggregate_at - now_ms) / 1_000);
            let chapters = if event_type.has_chapters() {
                self.chapter_phases(event.id, now_ms).await?
            } else {
                Vec::new()
            };

            return Ok(Some(EventSnapshot {
                server: self.server,
                event_id: event.id,
                event_type,
                phase,
                assetbundle_name: event.assetbundle_name,
                remaining_secs,
                remaining_label: remaining_secs.map(|s| format_remaining(s, true, self.server)),
                chapters,
                detail: raw.clone(),
            }));
        }

        Ok(None)
    }

    /// Phases of every chapter of `event_id` at `now_ms`, ordered by
    /// ascending character id.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MasterData`] if `worldBlooms.json` is
    /// missing or unparseable.
    pub async fn chapter_phases(
        &mut self,
        event_id: i64,
        now_ms: i64,
    ) -> Result<Vec<ChapterSnapshot>, TrackerError> {
        let chapters = self.chapters.load().await?;

        let mut phases = BTreeMap::new();
        for raw in chapters.iter() {
            let Ok(chapter) = serde_json::from_value::<CalendarChapter>(raw.clone()) else {
                continue;
            };
            if chapter.event_id != event_id {
                continue;
            }
            let window = ChapterWindow {
                chapter_start_at: chapter.chapter_start_at,
                aggregate_at: chapter.aggregate_at,
                chapter_end_at: chapter.chapter_end_at,
            };
            phases.insert(chapter.game_character_id, window.phase_at(now_ms));
        }

        Ok(phases
            .into_iter()
            .map(|(character_id, phase)| ChapterSnapshot {
                character_id,
                phase,
            })
            .collect())
    }
}
