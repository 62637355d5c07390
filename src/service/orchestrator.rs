//! Periodic driver fanning each tick out to every enabled server.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span, warn};

use super::daemon::CycleOutcome;
use super::registry::TrackerRegistry;
use crate::domain::{ResponseCache, ServerRegion};
use crate::upstream::RankingSource;

/// Runs tracker cycles for every registered server.
///
/// Each server's cycle runs on its own task and holds that server's daemon
/// lock for its whole duration. A tick arriving while the previous cycle
/// of a server still holds the lock is dropped for that server.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<TrackerRegistry>,
    source: Arc<dyn RankingSource>,
    response_cache: ResponseCache,
}

impl Orchestrator {
    /// Creates an orchestrator over `registry`.
    #[must_use]
    pub fn new(
        registry: Arc<TrackerRegistry>,
        source: Arc<dyn RankingSource>,
        response_cache: ResponseCache,
    ) -> Self {
        Self {
            registry,
            source,
            response_cache,
        }
    }

    /// Registry driven by this orchestrator.
    #[must_use]
    pub const fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    /// Runs one cycle on every server concurrently and waits for all of
    /// them. A failing server never affects the others.
    pub async fn tick(&self, now_ms: i64) -> Vec<(ServerRegion, CycleOutcome)> {
        let servers = self.registry.servers().await;
        let handles: Vec<_> = servers
            .iter()
            .map(|&server| {
                let this = self.clone();
                tokio::spawn(
                    async move { this.run_server(server, now_ms).await }
                        .instrument(info_span!("tracker_cycle", %server)),
                )
            })
            .collect();

        let results = join_all(handles).await;
        servers
            .into_iter()
            .zip(results)
            .map(|(server, result)| {
                let outcome = result.unwrap_or_else(|e| {
                    warn!(%server, error = %e, "tracker cycle task aborted");
                    CycleOutcome::Failed(format!("cycle task aborted: {e}"))
                });
                (server, outcome)
            })
            .collect()
    }

    async fn run_server(&self, server: ServerRegion, now_ms: i64) -> CycleOutcome {
        let daemon = match self.registry.get(server).await {
            Ok(daemon) => daemon,
            Err(e) => return CycleOutcome::Failed(e.to_string()),
        };
        let Ok(mut daemon) = daemon.try_lock() else {
            warn!(%server, "previous cycle still running, skipping tick");
            return CycleOutcome::Busy;
        };
        daemon
            .run_cycle(self.source.as_ref(), &self.response_cache, now_ms)
            .await
    }

    /// Ticks every `period` until `shutdown` resolves.
    ///
    /// Each tick runs on its own task: a slow cycle never delays the timer, and
    /// missed ticks are skipped rather than bunched up. After `shutdown`
    /// no new tick starts and the cycles still in flight are awaited.
    pub async fn run<F>(self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);
        info!(period_secs = period.as_secs(), "orchestrator started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(in_flight = in_flight.len(), "orchestrator stopping");
                    break;
                }
                _ = interval.tick() => {
                    let this = self.clone();
                    in_flight.spawn(async move {
                        let outcomes = this.tick(Utc::now().timestamp_millis()).await;
                        for (server, outcome) in outcomes {
                            debug!(%server, ?outcome, "tracker cycle finished");
                        }
                    });
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "tick task aborted");
                    }
                }
            }
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "tick task aborted");
            }
        }
        info!("orchestrator stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::RankingView;
    use crate::error::TrackerError;
    use crate::master_data::MasterDataParser;
    use crate::master_data::parser::tests::write_calendars;
    use crate::persistence::{RankingFilter, RankingStore};
    use crate::service::TrackerDaemon;
    use crate::upstream::testing::{StaticRankingSource, top_entries};

    async fn registry_with(servers: &[(ServerRegion, &std::path::Path)]) -> Arc<TrackerRegistry> {
        let registry = Arc::new(TrackerRegistry::new());
        for &(server, dir) in servers {
            let Ok(store) = RankingStore::in_memory().await else {
                panic!("store");
            };
            let daemon = TrackerDaemon::new(server, MasterDataParser::new(server, dir), store);
            let Ok(_) = registry.insert(daemon).await else {
                panic!("insert");
            };
        }
        registry
    }

    fn source() -> Arc<StaticRankingSource> {
        Arc::new(StaticRankingSource::new(
            RankingView {
                entries: top_entries(10),
                chapters: Vec::new(),
            },
            RankingView::default(),
        ))
    }

    #[tokio::test]
    async fn failing_server_does_not_block_others() {
        let Ok(good) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(empty) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let now = Utc::now().timestamp_millis();
        write_calendars(
            good.path(),
            &json!([{
                "id": 3, "eventType": "marathon", "assetbundleName": "e3",
                "startAt": now - 1_000, "aggregateAt": now + 3_600_000,
                "closedAt": now + 7_200_000,
            }]),
            &json!([]),
        )
        .await;

        let registry =
            registry_with(&[(ServerRegion::Jp, good.path()), (ServerRegion::En, empty.path())])
                .await;
        let orchestrator = Orchestrator::new(registry, source(), ResponseCache::new());

        let outcomes = orchestrator.tick(now).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().any(|(server, outcome)| *server == ServerRegion::Jp
            && matches!(outcome, CycleOutcome::Recorded(_))));
        assert!(outcomes.iter().any(|(server, outcome)| *server == ServerRegion::En
            && *outcome == CycleOutcome::MasterDataUnavailable));
    }

    #[tokio::test]
    async fn held_lock_reports_busy() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let registry = registry_with(&[(ServerRegion::Tw, dir.path())]).await;
        let orchestrator = Orchestrator::new(Arc::clone(&registry), source(), ResponseCache::new());

        let Ok(daemon) = registry.get(ServerRegion::Tw).await else {
            panic!("daemon");
        };
        let guard = daemon.lock().await;
        let outcomes = orchestrator.tick(0).await;
        drop(guard);

        assert_eq!(outcomes, vec![(ServerRegion::Tw, CycleOutcome::Busy)]);
        assert_eq!(
            orchestrator.tick(0).await,
            vec![(ServerRegion::Tw, CycleOutcome::MasterDataUnavailable)]
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let registry = Arc::new(TrackerRegistry::new());
        let orchestrator = Orchestrator::new(registry, source(), ResponseCache::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(orchestrator.run(Duration::from_millis(10), async move {
            let _ = rx.await;
        }));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = tx.send(());
        assert!(handle.await.is_ok());
    }

    #[derive(Debug)]
    struct SlowRankingSource {
        inner: Arc<StaticRankingSource>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl RankingSource for SlowRankingSource {
        async fn fetch_top(
            &self,
            server: ServerRegion,
            event_id: i64,
        ) -> Result<RankingView, TrackerError> {
            tokio::time::sleep(self.delay).await;
            self.inner.fetch_top(server, event_id).await
        }

        async fn fetch_border(
            &self,
            server: ServerRegion,
            event_id: i64,
        ) -> Result<RankingView, TrackerError> {
            self.inner.fetch_border(server, event_id).await
        }
    }

    #[tokio::test]
    async fn shutdown_waits_for_cycle_in_flight() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let now = Utc::now().timestamp_millis();
        write_calendars(
            dir.path(),
            &json!([{
                "id": 4, "eventType": "marathon", "assetbundleName": "e4",
                "startAt": now - 1_000, "aggregateAt": now + 3_600_000,
                "closedAt": now + 7_200_000,
            }]),
            &json!([]),
        )
        .await;
        let Ok(store) = RankingStore::in_memory().await else {
            panic!("store");
        };
        let registry = Arc::new(TrackerRegistry::new());
        let daemon = TrackerDaemon::new(
            ServerRegion::Jp,
            MasterDataParser::new(ServerRegion::Jp, dir.path()),
            store.clone(),
        );
        let Ok(_) = registry.insert(daemon).await else {
            panic!("insert");
        };
        let slow = Arc::new(SlowRankingSource {
            inner: source(),
            delay: Duration::from_millis(150),
        });
        let orchestrator = Orchestrator::new(registry, slow, ResponseCache::new());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(orchestrator.run(Duration::from_secs(60), async move {
            let _ = rx.await;
        }));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = tx.send(());
        assert!(handle.await.is_ok());

        let Ok(rows) = store
            .fetch_rankings(4, &RankingFilter::rank(1), false)
            .await
        else {
            panic!("read");
        };
        assert_eq!(rows.len(), 1);
    }
}
