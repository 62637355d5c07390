//! Per-server lifecycle state machine.
//!
//! Each tick, [`TrackerDaemon::run_cycle`] reads the live event from master
//! data, installs a new [`EventTracker`] when a newer event appears, and
//! decides whether this cycle records, finalizes or skips.

use tracing::{debug, error, info, warn};

use super::tracker::{EventTracker, RecordContext, RecordScope, RecordSummary};
use crate::domain::{EventPhase, EventSnapshot, ResponseCache, ServerRegion};
use crate::error::TrackerError;
use crate::master_data::MasterDataParser;
use crate::persistence::RankingStore;
use crate::upstream::RankingSource;

/// Why a cycle did not touch upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Master data reports a different event than the one tracked.
    EventMismatch {
        /// Tracked event id.
        tracked: i64,
        /// Event id found in master data.
        detected: i64,
    },
    /// The tracked event is already finalized.
    EventEnded,
    /// Scores are frozen; waiting for the final results.
    Aggregating,
    /// The event has not started.
    NotStarted,
}

/// Result of one daemon cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Master data shows no live event.
    NoLiveEvent,
    /// Master data could not be read; treated as no live event.
    MasterDataUnavailable,
    /// Nothing to do this cycle.
    Skipped(SkipReason),
    /// A normal ranking cycle was written.
    Recorded(RecordSummary),
    /// The final ranking of the event was written.
    EventFinalized(RecordSummary),
    /// The final ranking of one chapter was written.
    ChapterFinalized {
        /// Finalized chapter.
        character_id: i64,
        /// Written rows.
        summary: RecordSummary,
    },
    /// The previous cycle of this server was still running.
    Busy,
    /// Upstream, persistence or provisioning failed; retried next tick.
    Failed(String),
}

/// Owns the tracker slot of one server.
#[derive(Debug)]
pub struct TrackerDaemon {
    server: ServerRegion,
    parser: MasterDataParser,
    store: RankingStore,
    tracker: Option<EventTracker>,
}

impl TrackerDaemon {
    /// Creates an idle daemon.
    #[must_use]
    pub const fn new(server: ServerRegion, parser: MasterDataParser, store: RankingStore) -> Self {
        Self {
            server,
            parser,
            store,
            tracker: None,
        }
    }

    /// Server this daemon drives.
    #[must_use]
    pub const fn server(&self) -> ServerRegion {
        self.server
    }

    /// Current tracker, if one was installed.
    #[must_use]
    pub const fn tracker(&self) -> Option<&EventTracker> {
        self.tracker.as_ref()
    }

    /// Store this daemon writes to.
    #[must_use]
    pub const fn store(&self) -> &RankingStore {
        &self.store
    }

    /// Installs a tracker for `snapshot` if none exists or the snapshot's
    /// event is newer than the tracked one.
    ///
    /// The new event's tables are provisioned before it is installed. The
    /// replaced tracker is stopped and returned.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] if provisioning fails; the
    /// previous tracker stays installed in that case.
    pub async fn ensure_tracker(
        &mut self,
        snapshot: &EventSnapshot,
    ) -> Result<Option<EventTracker>, TrackerError> {
        if let Some(current) = &self.tracker
            && snapshot.event_id <= current.event_id()
        {
            return Ok(None);
        }

        self.store
            .provision(snapshot.event_id, snapshot.event_type)
            .await?;
        let tracker = EventTracker::new(snapshot);
        info!(
            server = %self.server,
            event_id = snapshot.event_id,
            event_type = %snapshot.event_type,
            "tracking new event"
        );

        let mut retired = self.tracker.replace(tracker);
        if let Some(old) = retired.as_mut() {
            old.stop();
        }
        Ok(retired)
    }

    /// Runs one lifecycle cycle at `now_ms`.
    ///
    /// Failures are logged and reported in the outcome; they never escape
    /// the cycle.
    pub async fn run_cycle(
        &mut self,
        source: &dyn RankingSource,
        response_cache: &ResponseCache,
        now_ms: i64,
    ) -> CycleOutcome {
        let snapshot = match self.parser.current_event(now_ms).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(server = %self.server, "no live event");
                return CycleOutcome::NoLiveEvent;
            }
            Err(e) => {
                warn!(server = %self.server, error = %e, "master data unavailable");
                return CycleOutcome::MasterDataUnavailable;
            }
        };

        if let Err(e) = self.ensure_tracker(&snapshot).await {
            error!(server = %self.server, event_id = snapshot.event_id, error = %e, "failed to start tracker");
            return CycleOutcome::Failed(e.to_string());
        }
        let Some(tracker) = self.tracker.as_mut() else {
            return CycleOutcome::Failed("no tracker installed".into());
        };

        let ctx = RecordContext {
            source,
            store: &self.store,
            response_cache,
        };
        let outcome = advance(tracker, &ctx, &snapshot, now_ms).await;
        if let CycleOutcome::Failed(reason) = &outcome {
            error!(server = %self.server, event_id = snapshot.event_id, %reason, "tracker cycle failed");
        }
        outcome
    }
}

async fn advance(
    tracker: &mut EventTracker,
    ctx: &RecordContext<'_>,
    snapshot: &EventSnapshot,
    now_ms: i64,
) -> CycleOutcome {
    if snapshot.event_id != tracker.event_id() {
        warn!(
            server = %tracker.server(),
            tracked = tracker.event_id(),
            detected = snapshot.event_id,
            "live event differs from tracked event"
        );
        return CycleOutcome::Skipped(SkipReason::EventMismatch {
            tracked: tracker.event_id(),
            detected: snapshot.event_id,
        });
    }
    if tracker.is_event_ended() {
        return CycleOutcome::Skipped(SkipReason::EventEnded);
    }

    match snapshot.phase {
        EventPhase::NotStarted => CycleOutcome::Skipped(SkipReason::NotStarted),
        EventPhase::Aggregating => {
            info!(server = %tracker.server(), event_id = tracker.event_id(), "event aggregating, waiting");
            CycleOutcome::Skipped(SkipReason::Aggregating)
        }
        EventPhase::Ended => {
            match tracker.record(ctx, snapshot, RecordScope::Full, now_ms).await {
                Ok(summary) => {
                    tracker.mark_event_ended();
                    info!(server = %tracker.server(), event_id = tracker.event_id(), "final ranking recorded");
                    CycleOutcome::EventFinalized(summary)
                }
                Err(e) => CycleOutcome::Failed(e.to_string()),
            }
        }
        EventPhase::Ongoing => {
            if tracker.event_type().has_chapters()
                && let Some(character_id) = tracker.chapter_to_finalize(snapshot)
            {
                let scope = RecordScope::ChapterFinal(character_id);
                return match tracker.record(ctx, snapshot, scope, now_ms).await {
                    Ok(summary) => {
                        tracker.mark_chapter_ended(character_id);
                        info!(server = %tracker.server(), character_id, "final chapter ranking recorded");
                        CycleOutcome::ChapterFinalized {
                            character_id,
                            summary,
                        }
                    }
                    Err(e) => CycleOutcome::Failed(e.to_string()),
                };
            }
            match tracker.record(ctx, snapshot, RecordScope::Full, now_ms).await {
                Ok(summary) => CycleOutcome::Recorded(summary),
                Err(e) => CycleOutcome::Failed(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::path::Path;

    use serde_json::{Value, json};

    use super::*;
    use crate::domain::RankingView;
    use crate::master_data::parser::tests::write_calendars;
    use crate::persistence::RankingFilter;
    use crate::upstream::testing::{StaticRankingSource, chapter, top_entries};

    fn marathon(id: i64, start: i64, aggregate: i64, closed: i64) -> Value {
        json!({
            "id": id, "eventType": "marathon", "assetbundleName": format!("e{id}"),
            "startAt": start, "aggregateAt": aggregate, "closedAt": closed,
        })
    }

    async fn daemon_for(dir: &Path) -> TrackerDaemon {
        let Ok(store) = RankingStore::in_memory().await else {
            panic!("store");
        };
        TrackerDaemon::new(
            ServerRegion::Jp,
            MasterDataParser::new(ServerRegion::Jp, dir),
            store,
        )
    }

    fn source() -> StaticRankingSource {
        StaticRankingSource::new(
            RankingView {
                entries: top_entries(100),
                chapters: vec![chapter(1, 10), chapter(2, 10)],
            },
            RankingView::default(),
        )
    }

    #[tokio::test]
    async fn lifecycle_records_waits_and_finalizes_once() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        write_calendars(dir.path(), &json!([marathon(1, 0, 1_000, 2_000)]), &json!([])).await;
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        let cache = ResponseCache::new();

        assert!(matches!(
            daemon.run_cycle(&source, &cache, 500).await,
            CycleOutcome::Recorded(_)
        ));
        assert!(matches!(
            daemon.run_cycle(&source, &cache, 1_500).await,
            CycleOutcome::Skipped(SkipReason::Aggregating)
        ));
        assert_eq!(source.calls(), 2);

        assert!(matches!(
            daemon.run_cycle(&source, &cache, 600_001).await,
            CycleOutcome::EventFinalized(_)
        ));
        assert_eq!(source.calls(), 4);
        assert!(daemon.tracker().is_some_and(EventTracker::is_event_ended));

        assert!(matches!(
            daemon.run_cycle(&source, &cache, 600_500).await,
            CycleOutcome::Skipped(SkipReason::EventEnded)
        ));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn failed_final_record_is_retried() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        write_calendars(dir.path(), &json!([marathon(1, 0, 1_000, 2_000)]), &json!([])).await;
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        let cache = ResponseCache::new();

        source.set_failing(true);
        assert!(matches!(
            daemon.run_cycle(&source, &cache, 300_000).await,
            CycleOutcome::Failed(_)
        ));
        assert!(daemon.tracker().is_some_and(|t| !t.is_event_ended()));

        source.set_failing(false);
        assert!(matches!(
            daemon.run_cycle(&source, &cache, 310_000).await,
            CycleOutcome::EventFinalized(_)
        ));
    }

    #[tokio::test]
    async fn newer_event_replaces_tracker() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        let cache = ResponseCache::new();

        write_calendars(dir.path(), &json!([marathon(1, 0, 1_000, 2_000)]), &json!([])).await;
        let _ = daemon.run_cycle(&source, &cache, 500).await;
        assert_eq!(daemon.tracker().map(EventTracker::event_id), Some(1));

        write_calendars(
            dir.path(),
            &json!([marathon(2, 10_000, 20_000, 30_000)]),
            &json!([]),
        )
        .await;
        let Ok(snapshot) = daemon.parser.current_event(15_000).await else {
            panic!("master data");
        };
        let Some(snapshot) = snapshot else {
            panic!("event 2 live");
        };
        let Ok(Some(retired)) = daemon.ensure_tracker(&snapshot).await else {
            panic!("tracker should be replaced");
        };
        assert_eq!(retired.event_id(), 1);
        assert!(retired.is_stopped());
        assert_eq!(daemon.tracker().map(EventTracker::event_id), Some(2));
        assert!(matches!(daemon.store().event_exists(2).await, Ok(true)));

        assert!(matches!(
            daemon.run_cycle(&source, &cache, 15_500).await,
            CycleOutcome::Recorded(_)
        ));
    }

    #[tokio::test]
    async fn replacement_after_finalized_event_starts_with_clear_flags() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        let cache = ResponseCache::new();

        write_calendars(
            dir.path(),
            &json!([{
                "id": 1, "eventType": "world_bloom", "assetbundleName": "wl1",
                "startAt": 0, "aggregateAt": 100_000, "closedAt": 110_000,
            }]),
            &json!([
                {"eventId": 1, "gameCharacterId": 1, "chapterStartAt": 0,
                 "aggregateAt": 1_000, "chapterEndAt": 2_000},
            ]),
        )
        .await;
        assert!(matches!(
            daemon.run_cycle(&source, &cache, 3_000).await,
            CycleOutcome::ChapterFinalized { character_id: 1, .. }
        ));
        assert!(matches!(
            daemon.run_cycle(&source, &cache, 200_000).await,
            CycleOutcome::EventFinalized(_)
        ));
        assert!(
            daemon
                .tracker()
                .is_some_and(|t| t.is_event_ended() && t.is_chapter_ended(1))
        );

        write_calendars(
            dir.path(),
            &json!([{
                "id": 2, "eventType": "world_bloom", "assetbundleName": "wl2",
                "startAt": 300_000, "aggregateAt": 400_000, "closedAt": 410_000,
            }]),
            &json!([
                {"eventId": 2, "gameCharacterId": 1, "chapterStartAt": 300_000,
                 "aggregateAt": 350_000, "chapterEndAt": 360_000},
            ]),
        )
        .await;
        let Ok(Some(snapshot)) = daemon.parser.current_event(320_000).await else {
            panic!("event 2 live");
        };
        let Ok(Some(mut retired)) = daemon.ensure_tracker(&snapshot).await else {
            panic!("tracker should be replaced");
        };
        assert_eq!(retired.event_id(), 1);
        assert!(retired.is_stopped());
        assert!(!retired.stop());

        let Some(tracker) = daemon.tracker() else {
            panic!("tracker installed");
        };
        assert_eq!(tracker.event_id(), 2);
        assert!(!tracker.is_event_ended());
        assert!(!tracker.is_chapter_ended(1));
        assert!(!tracker.is_stopped());

        assert!(matches!(
            daemon.run_cycle(&source, &cache, 320_500).await,
            CycleOutcome::Recorded(_)
        ));
        assert!(matches!(daemon.ensure_tracker(&snapshot).await, Ok(None)));
        assert!(daemon.tracker().is_some_and(|t| !t.is_stopped()));
    }

    #[tokio::test]
    async fn older_event_is_skipped_as_mismatch() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        let cache = ResponseCache::new();

        write_calendars(dir.path(), &json!([marathon(5, 0, 1_000, 2_000)]), &json!([])).await;
        let _ = daemon.run_cycle(&source, &cache, 500).await;

        write_calendars(dir.path(), &json!([marathon(4, 0, 1_000, 2_000)]), &json!([])).await;
        let calls = source.calls();
        assert_eq!(
            daemon.run_cycle(&source, &cache, 600).await,
            CycleOutcome::Skipped(SkipReason::EventMismatch {
                tracked: 5,
                detected: 4
            })
        );
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test]
    async fn world_bloom_finalizes_one_chapter_per_cycle() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        write_calendars(
            dir.path(),
            &json!([{
                "id": 9, "eventType": "world_bloom", "assetbundleName": "wl",
                "startAt": 0, "aggregateAt": 100_000, "closedAt": 110_000,
            }]),
            &json!([
                {"eventId": 9, "gameCharacterId": 1, "chapterStartAt": 0,
                 "aggregateAt": 1_000, "chapterEndAt": 2_000},
                {"eventId": 9, "gameCharacterId": 2, "chapterStartAt": 0,
                 "aggregateAt": 1_000, "chapterEndAt": 2_000},
            ]),
        )
        .await;
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        let cache = ResponseCache::new();

        let CycleOutcome::ChapterFinalized { character_id, .. } =
            daemon.run_cycle(&source, &cache, 3_000).await
        else {
            panic!("first chapter should finalize");
        };
        assert_eq!(character_id, 1);

        let CycleOutcome::ChapterFinalized { character_id, .. } =
            daemon.run_cycle(&source, &cache, 3_100).await
        else {
            panic!("second chapter should finalize");
        };
        assert_eq!(character_id, 2);

        let CycleOutcome::Recorded(summary) = daemon.run_cycle(&source, &cache, 3_200).await
        else {
            panic!("normal cycle expected");
        };
        assert_eq!(summary.character_id, None);
        assert_eq!(summary.ranking_rows, 100);

        let filter = RankingFilter::default().in_chapter(Some(2));
        let Ok(rows) = daemon.store().fetch_rankings(9, &filter, false).await else {
            panic!("read");
        };
        assert_eq!(rows.len(), 10);
    }

    #[tokio::test]
    async fn missing_master_data_is_reported() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let mut daemon = daemon_for(dir.path()).await;
        let source = source();
        assert_eq!(
            daemon.run_cycle(&source, &ResponseCache::new(), 0).await,
            CycleOutcome::MasterDataUnavailable
        );
        assert_eq!(source.calls(), 0);
        assert!(daemon.tracker().is_none());
    }
}
