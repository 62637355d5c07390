//! Per-event tracker: fetch, merge, persist.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::merge::{BorderChangeCache, StagedBorder, chapter_border_key, main_border_key};
use crate::domain::{EventPhase, EventSnapshot, EventType, ResponseCache, ServerRegion};
use crate::error::TrackerError;
use crate::persistence::{CycleRows, RankingStore};
use crate::upstream::RankingSource;

/// What a recording cycle writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Main leaderboard plus the active chapter, if any.
    Full,
    /// Only the final rows of this chapter's leaderboard.
    ChapterFinal(i64),
}

/// Outcome of one successful recording cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordSummary {
    /// Cycle timestamp in seconds.
    pub recorded_at: i64,
    /// Main rows written.
    pub ranking_rows: usize,
    /// Chapter rows written.
    pub chapter_rows: usize,
    /// Chapter recorded in this cycle.
    pub character_id: Option<i64>,
}

/// Collaborators a recording cycle needs.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    /// Upstream views.
    pub source: &'a dyn RankingSource,
    /// Destination store.
    pub store: &'a RankingStore,
    /// Memo invalidated after commit.
    pub response_cache: &'a ResponseCache,
}

/// Tracks one event on one server.
///
/// Owns the end flags and the border change cache of the event. Dropped
/// or stopped once a newer event is detected.
#[derive(Debug)]
pub struct EventTracker {
    server: ServerRegion,
    event_id: i64,
    event_type: EventType,
    is_event_ended: bool,
    chapter_ended: BTreeMap<i64, bool>,
    border_cache: BorderChangeCache,
    stopped: bool,
}

impl EventTracker {
    /// Creates a tracker for the event in `snapshot`.
    #[must_use]
    pub fn new(snapshot: &EventSnapshot) -> Self {
        Self {
            server: snapshot.server,
            event_id: snapshot.event_id,
            event_type: snapshot.event_type,
            is_event_ended: false,
            chapter_ended: snapshot
                .chapters
                .iter()
                .map(|c| (c.character_id, false))
                .collect(),
            border_cache: BorderChangeCache::new(),
            stopped: false,
        }
    }

    /// Server of the tracked event.
    #[must_use]
    pub const fn server(&self) -> ServerRegion {
        self.server
    }

    /// Tracked event id.
    #[must_use]
    pub const fn event_id(&self) -> i64 {
        self.event_id
    }

    /// Tracked event format.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Whether the final record of the event has been written.
    #[must_use]
    pub const fn is_event_ended(&self) -> bool {
        self.is_event_ended
    }

    /// Whether the final record of a chapter has been written.
    #[must_use]
    pub fn is_chapter_ended(&self, character_id: i64) -> bool {
        self.chapter_ended.get(&character_id).copied().unwrap_or(false)
    }

    /// Whether [`EventTracker::stop`] has been called.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Border cache of this event.
    #[must_use]
    pub const fn border_cache(&self) -> &BorderChangeCache {
        &self.border_cache
    }

    /// Marks the event as finalized. Never cleared.
    pub fn mark_event_ended(&mut self) {
        self.is_event_ended = true;
    }

    /// Marks a chapter as finalized. Never cleared.
    pub fn mark_chapter_ended(&mut self, character_id: i64) {
        self.chapter_ended.insert(character_id, true);
    }

    /// Stops the tracker. Returns `true` only on the first call.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        info!(server = %self.server, event_id = self.event_id, "event tracker stopped");
        true
    }

    /// Chapter a normal cycle records: the first, by ascending character
    /// id, that is ongoing or ended without a final record yet.
    #[must_use]
    pub fn chapter_to_record(&self, snapshot: &EventSnapshot) -> Option<i64> {
        snapshot
            .chapters
            .iter()
            .find(|c| match c.phase {
                EventPhase::Ongoing => true,
                EventPhase::Ended => !self.is_chapter_ended(c.character_id),
                EventPhase::NotStarted | EventPhase::Aggregating => false,
            })
            .map(|c| c.character_id)
    }

    /// First chapter, by ascending character id, that ended without a
    /// final record yet.
    #[must_use]
    pub fn chapter_to_finalize(&self, snapshot: &EventSnapshot) -> Option<i64> {
        for chapter in &snapshot.chapters {
            match chapter.phase {
                EventPhase::Aggregating => {
                    debug!(
                        server = %self.server,
                        character_id = chapter.character_id,
                        "chapter aggregating, waiting"
                    );
                }
                EventPhase::Ended if !self.is_chapter_ended(chapter.character_id) => {
                    return Some(chapter.character_id);
                }
                _ => {}
            }
        }
        None
    }

    /// Runs one recording cycle.
    ///
    /// Fetches both upstream views, merges them, writes every row in one
    /// transaction and only then commits the staged border digests and
    /// invalidates the server's response memo.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UpstreamFetch`] if either view cannot be
    /// fetched and [`TrackerError::Persistence`] if the write fails. In
    /// both cases nothing is written and the border cache is unchanged.
    pub async fn record(
        &mut self,
        ctx: &RecordContext<'_>,
        snapshot: &EventSnapshot,
        scope: RecordScope,
        now_ms: i64,
    ) -> Result<RecordSummary, TrackerError> {
        let top = ctx.source.fetch_top(self.server, self.event_id).await?;
        let border = ctx.source.fetch_border(self.server, self.event_id).await?;
        let recorded_at = now_ms.div_euclid(1_000);

        let mut staged: Vec<StagedBorder> = Vec::new();

        let main_entries = match scope {
            RecordScope::Full => {
                let key = main_border_key(self.server, self.event_id);
                let outcome = self.border_cache.stage(&top.entries, &border.entries, &key);
                staged.extend(outcome.staged);
                outcome.entries
            }
            RecordScope::ChapterFinal(_) => Vec::new(),
        };

        let character_id = match scope {
            _ if !self.event_type.has_chapters() => None,
            RecordScope::Full => self.chapter_to_record(snapshot),
            RecordScope::ChapterFinal(character_id) => Some(character_id),
        };
        let chapter_entries = match character_id {
            Some(character_id) => {
                let key = chapter_border_key(self.server, self.event_id, character_id);
                let outcome = self.border_cache.stage(
                    top.chapter(character_id),
                    border.chapter(character_id),
                    &key,
                );
                staged.extend(outcome.staged);
                outcome.entries
            }
            None => Vec::new(),
        };

        let rows = CycleRows::project(recorded_at, &main_entries, &chapter_entries);
        if rows.is_empty() {
            warn!(server = %self.server, event_id = self.event_id, "cycle produced no rows");
        }
        let written = ctx.store.record_cycle(self.event_id, &rows).await?;

        for border in staged {
            self.border_cache.commit(border);
        }
        let dropped = ctx.response_cache.invalidate(self.server.as_str()).await;

        info!(
            server = %self.server,
            event_id = self.event_id,
            ranking_rows = written.ranking_rows,
            chapter_rows = written.chapter_rows,
            identities = written.identities,
            character_id,
            dropped_responses = dropped,
            remaining = snapshot.remaining_label.as_deref().unwrap_or("-"),
            "ranking cycle recorded"
        );

        Ok(RecordSummary {
            recorded_at,
            ranking_rows: written.ranking_rows,
            chapter_rows: written.chapter_rows,
            character_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{ChapterSnapshot, RankingView};
    use crate::persistence::RankingFilter;
    use crate::upstream::testing::{StaticRankingSource, chapter, entry, top_entries};

    fn snapshot(event_type: EventType, chapters: Vec<ChapterSnapshot>) -> EventSnapshot {
        EventSnapshot {
            server: ServerRegion::Jp,
            event_id: 1,
            event_type,
            phase: EventPhase::Ongoing,
            assetbundle_name: "event_1".into(),
            remaining_secs: None,
            remaining_label: None,
            chapters,
            detail: json!({}),
        }
    }

    fn chapters(phases: &[(i64, EventPhase)]) -> Vec<ChapterSnapshot> {
        phases
            .iter()
            .map(|&(character_id, phase)| ChapterSnapshot {
                character_id,
                phase,
            })
            .collect()
    }

    async fn provisioned_store(event_type: EventType) -> RankingStore {
        let Ok(store) = RankingStore::in_memory().await else {
            panic!("store");
        };
        let Ok(_) = store.provision(1, event_type).await else {
            panic!("provision");
        };
        store
    }

    fn border_view() -> RankingView {
        RankingView {
            entries: vec![entry("b100", "b", 100, 1), entry("b200", "c", 200, 1)],
            chapters: Vec::new(),
        }
    }

    #[test]
    fn stop_reports_first_call_only() {
        let mut tracker = EventTracker::new(&snapshot(EventType::Marathon, Vec::new()));
        assert!(tracker.stop());
        assert!(!tracker.stop());
        assert!(tracker.is_stopped());
    }

    #[test]
    fn chapter_selection_scans_ascending() {
        let snap = snapshot(
            EventType::WorldBloom,
            chapters(&[
                (1, EventPhase::Ended),
                (2, EventPhase::Ongoing),
                (3, EventPhase::NotStarted),
            ]),
        );
        let mut tracker = EventTracker::new(&snap);
        assert_eq!(tracker.chapter_to_record(&snap), Some(1));
        assert_eq!(tracker.chapter_to_finalize(&snap), Some(1));

        tracker.mark_chapter_ended(1);
        assert_eq!(tracker.chapter_to_record(&snap), Some(2));
        assert_eq!(tracker.chapter_to_finalize(&snap), None);
    }

    #[test]
    fn aggregating_chapter_is_neither_recorded_nor_finalized() {
        let snap = snapshot(
            EventType::WorldBloom,
            chapters(&[(4, EventPhase::Aggregating)]),
        );
        let tracker = EventTracker::new(&snap);
        assert_eq!(tracker.chapter_to_record(&snap), None);
        assert_eq!(tracker.chapter_to_finalize(&snap), None);
    }

    #[tokio::test]
    async fn record_persists_merged_rows_and_invalidates_cache() {
        let store = provisioned_store(EventType::Marathon).await;
        let cache = ResponseCache::new();
        cache.put("jp", "/event/jp/1/ranking-lines", json!([]), 0).await;
        let source = StaticRankingSource::new(
            RankingView {
                entries: top_entries(100),
                chapters: Vec::new(),
            },
            border_view(),
        );
        let ctx = RecordContext {
            source: &source,
            store: &store,
            response_cache: &cache,
        };
        let snap = snapshot(EventType::Marathon, Vec::new());
        let mut tracker = EventTracker::new(&snap);

        let Ok(first) = tracker.record(&ctx, &snap, RecordScope::Full, 60_000).await else {
            panic!("first cycle");
        };
        assert_eq!(first.ranking_rows, 101);
        assert_eq!(first.recorded_at, 60);
        assert_eq!(cache.len("jp").await, 0);

        let Ok(second) = tracker.record(&ctx, &snap, RecordScope::Full, 120_000).await else {
            panic!("second cycle");
        };
        assert_eq!(second.ranking_rows, 100);
        assert_eq!(tracker.border_cache().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_border_uncommitted() {
        let Ok(store) = RankingStore::in_memory().await else {
            panic!("store");
        };
        let cache = ResponseCache::new();
        let source = StaticRankingSource::new(
            RankingView {
                entries: top_entries(5),
                chapters: Vec::new(),
            },
            border_view(),
        );
        let ctx = RecordContext {
            source: &source,
            store: &store,
            response_cache: &cache,
        };
        let snap = snapshot(EventType::Marathon, Vec::new());
        let mut tracker = EventTracker::new(&snap);

        assert!(matches!(
            tracker.record(&ctx, &snap, RecordScope::Full, 1_000).await,
            Err(TrackerError::Persistence(_))
        ));
        assert!(tracker.border_cache().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let store = provisioned_store(EventType::Marathon).await;
        let cache = ResponseCache::new();
        let source = StaticRankingSource::new(RankingView::default(), RankingView::default());
        source.set_failing(true);
        let ctx = RecordContext {
            source: &source,
            store: &store,
            response_cache: &cache,
        };
        let snap = snapshot(EventType::Marathon, Vec::new());
        let mut tracker = EventTracker::new(&snap);

        assert!(matches!(
            tracker.record(&ctx, &snap, RecordScope::Full, 1_000).await,
            Err(TrackerError::UpstreamFetch(_))
        ));
        let Ok(rows) = store
            .fetch_rankings(1, &RankingFilter::default(), false)
            .await
        else {
            panic!("read");
        };
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn chapter_final_skips_main_rows() {
        let store = provisioned_store(EventType::WorldBloom).await;
        let cache = ResponseCache::new();
        let source = StaticRankingSource::new(
            RankingView {
                entries: top_entries(100),
                chapters: vec![chapter(1, 20), chapter(2, 20)],
            },
            RankingView::default(),
        );
        let ctx = RecordContext {
            source: &source,
            store: &store,
            response_cache: &cache,
        };
        let snap = snapshot(
            EventType::WorldBloom,
            chapters(&[(1, EventPhase::Ended), (2, EventPhase::Ongoing)]),
        );
        let mut tracker = EventTracker::new(&snap);

        let Ok(summary) = tracker
            .record(&ctx, &snap, RecordScope::ChapterFinal(1), 5_000)
            .await
        else {
            panic!("chapter final");
        };
        assert_eq!(summary.ranking_rows, 0);
        assert_eq!(summary.chapter_rows, 20);
        assert_eq!(summary.character_id, Some(1));
    }
}
