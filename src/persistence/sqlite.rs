//! SQLite implementation of the ranking store.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::{
    CycleRows, PlayerIdentityRecord, RankingFilter, RankingLine, RankingRecord, ScoreGrowth,
};
use super::schema::{EventTables, TableCatalog};
use crate::domain::EventType;
use crate::error::TrackerError;

/// Rows per multi-row `INSERT`.
const INSERT_CHUNK: usize = 200;

/// Summary of one committed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleWriteSummary {
    /// Main rows offered for insert.
    pub ranking_rows: usize,
    /// Chapter rows offered for insert.
    pub chapter_rows: usize,
    /// Identity rows upserted.
    pub identities: usize,
}

fn db_error(e: sqlx::Error) -> TrackerError {
    TrackerError::Persistence(e.to_string())
}

/// Per-server ranking store backed by one `SqlitePool`.
#[derive(Debug, Clone)]
pub struct RankingStore {
    pool: SqlitePool,
    catalog: Arc<TableCatalog>,
}

impl RankingStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            catalog: Arc::new(TableCatalog::new()),
        }
    }

    /// Opens (creating if missing) the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] if the URL is invalid or the
    /// database cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, TrackerError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(db_error)?;
        Ok(Self::new(pool))
    }

    /// Opens a private in-memory database on a single long-lived connection.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] if SQLite cannot be opened.
    pub async fn in_memory() -> Result<Self, TrackerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(db_error)?;
        Ok(Self::new(pool))
    }

    /// Table-name memo shared by every clone of this store.
    #[must_use]
    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    /// Creates the tables of `event_id` if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn provision(
        &self,
        event_id: i64,
        event_type: EventType,
    ) -> Result<Arc<EventTables>, TrackerError> {
        let tables = self.catalog.tables(event_id).await;
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for statement in tables.create_statements(event_type.has_chapters()) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        tracing::info!(event_id, event_type = %event_type, "event tables provisioned");
        Ok(tables)
    }

    /// Writes every row of one cycle inside a single transaction.
    ///
    /// Ranking rows that already exist for the same `(timestamp, user)`
    /// are left untouched; identities are upserted with the latest name
    /// and team. Any failure rolls the whole cycle back.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure, including
    /// writes to an event that was never provisioned.
    pub async fn record_cycle(
        &self,
        event_id: i64,
        rows: &CycleRows,
    ) -> Result<CycleWriteSummary, TrackerError> {
        let tables = self.catalog.tables(event_id).await;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for chunk in rows.rankings.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO \"{}\" (timestamp, user_id, score, \"rank\") ",
                tables.rankings
            ));
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.timestamp)
                    .push_bind(row.user_id.clone())
                    .push_bind(row.score)
                    .push_bind(row.rank);
            });
            qb.push(" ON CONFLICT DO NOTHING");
            qb.build().execute(&mut *tx).await.map_err(db_error)?;
        }

        for chunk in rows.chapter_rankings.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO \"{}\" (timestamp, user_id, character_id, score, \"rank\") ",
                tables.chapter_rankings
            ));
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.timestamp)
                    .push_bind(row.user_id.clone())
                    .push_bind(row.character_id.unwrap_or_default())
                    .push_bind(row.score)
                    .push_bind(row.rank);
            });
            qb.push(" ON CONFLICT DO NOTHING");
            qb.build().execute(&mut *tx).await.map_err(db_error)?;
        }

        for chunk in rows.identities.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO \"{}\" (user_id, name, cheerful_team_id) ",
                tables.identities
            ));
            qb.push_values(chunk, |mut b, identity| {
                b.push_bind(identity.user_id.clone())
                    .push_bind(identity.name.clone())
                    .push_bind(identity.cheerful_team_id);
            });
            qb.push(
                " ON CONFLICT(user_id) DO UPDATE SET \
                 name = excluded.name, cheerful_team_id = excluded.cheerful_team_id",
            );
            qb.build().execute(&mut *tx).await.map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;

        Ok(CycleWriteSummary {
            ranking_rows: rows.rankings.len(),
            chapter_rows: rows.chapter_rankings.len(),
            identities: rows.identities.len(),
        })
    }

    async fn table_exists(&self, name: &str) -> Result<bool, TrackerError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(count > 0)
    }

    /// Whether the main ranking table of `event_id` exists.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn event_exists(&self, event_id: i64) -> Result<bool, TrackerError> {
        let tables = self.catalog.tables(event_id).await;
        self.table_exists(&tables.rankings).await
    }

    /// Reads ranking rows matching `filter`.
    ///
    /// With `latest_only` at most the newest row is returned; otherwise rows
    /// come back in ascending timestamp order. A missing table reads as
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn fetch_rankings(
        &self,
        event_id: i64,
        filter: &RankingFilter,
        latest_only: bool,
    ) -> Result<Vec<RankingRecord>, TrackerError> {
        let tables = self.catalog.tables(event_id).await;
        let (table, character_column) = match filter.character_id {
            Some(_) => (&tables.chapter_rankings, "character_id"),
            None => (&tables.rankings, "NULL"),
        };
        if !self.table_exists(table).await? {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT timestamp, user_id, score, \"rank\", {character_column} FROM \"{table}\" WHERE 1 = 1"
        ));
        if let Some(user_id) = &filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(rank) = filter.rank {
            qb.push(" AND \"rank\" = ").push_bind(rank);
        }
        if let Some(character_id) = filter.character_id {
            qb.push(" AND character_id = ").push_bind(character_id);
        }
        if let Some(since) = filter.since {
            qb.push(" AND timestamp >= ").push_bind(since);
        }
        if latest_only {
            qb.push(" ORDER BY timestamp DESC LIMIT 1");
        } else {
            qb.push(" ORDER BY timestamp ASC");
        }

        let rows = qb
            .build_query_as::<(i64, String, i64, i64, Option<i64>)>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, user_id, score, rank, character_id)| RankingRecord {
                timestamp,
                user_id,
                score,
                rank,
                character_id,
            })
            .collect())
    }

    /// Latest known identity of `user_id` within `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn fetch_identity(
        &self,
        event_id: i64,
        user_id: &str,
    ) -> Result<Option<PlayerIdentityRecord>, TrackerError> {
        let tables = self.catalog.tables(event_id).await;
        if !self.table_exists(&tables.identities).await? {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, (String, String, Option<i64>)>(&format!(
            "SELECT user_id, name, cheerful_team_id FROM \"{}\" WHERE user_id = ?",
            tables.identities
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(user_id, name, cheerful_team_id)| PlayerIdentityRecord {
            user_id,
            name,
            cheerful_team_id,
        }))
    }

    /// Latest row at each of `ranks`. Ranks never recorded are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn ranking_lines(
        &self,
        event_id: i64,
        character_id: Option<i64>,
        ranks: &[i64],
    ) -> Result<Vec<RankingLine>, TrackerError> {
        let mut lines = Vec::with_capacity(ranks.len());
        for &rank in ranks {
            let filter = RankingFilter::rank(rank).in_chapter(character_id);
            let latest = self.fetch_rankings(event_id, &filter, true).await?;
            if let Some(row) = latest.into_iter().next() {
                lines.push(RankingLine {
                    rank,
                    score: row.score,
                    user_id: row.user_id,
                    timestamp: row.timestamp,
                });
            }
        }
        Ok(lines)
    }

    /// Score growth at each of `ranks` between the first and last row with
    /// `timestamp >= since`. Ranks with fewer than two rows are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn score_growth(
        &self,
        event_id: i64,
        character_id: Option<i64>,
        ranks: &[i64],
        since: i64,
    ) -> Result<Vec<ScoreGrowth>, TrackerError> {
        let mut growths = Vec::with_capacity(ranks.len());
        for &rank in ranks {
            let filter = RankingFilter::rank(rank)
                .in_chapter(character_id)
                .since(since);
            let rows = self.fetch_rankings(event_id, &filter, false).await?;
            if rows.len() < 2 {
                continue;
            }
            if let (Some(earlier), Some(latest)) = (rows.first(), rows.last()) {
                growths.push(ScoreGrowth {
                    rank,
                    timestamp_earlier: earlier.timestamp,
                    score_earlier: earlier.score,
                    timestamp_latest: latest.timestamp,
                    score_latest: latest.score,
                    growth: latest.score - earlier.score,
                });
            }
        }
        Ok(growths)
    }

    /// Closes every connection of the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
