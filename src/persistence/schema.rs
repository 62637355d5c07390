//! Per-event table naming and DDL.
//!
//! Each event gets its own tables:
//!
//! | Table               | Content                          |
//! |---------------------|----------------------------------|
//! | `event_{id}`        | main ranking time-series         |
//! | `event_{id}_users`  | latest identity per player       |
//! | `wl_{id}`           | chapter ranking time-series      |
//!
//! Event ids are integers, so the generated names never need escaping
//! beyond plain double quotes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Table names of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTables {
    /// Event identifier.
    pub event_id: i64,
    /// Main ranking table.
    pub rankings: String,
    /// Identity table.
    pub identities: String,
    /// Chapter ranking table.
    pub chapter_rankings: String,
}

impl EventTables {
    /// Names for `event_id`.
    #[must_use]
    pub fn for_event(event_id: i64) -> Self {
        Self {
            event_id,
            rankings: format!("event_{event_id}"),
            identities: format!("event_{event_id}_users"),
            chapter_rankings: format!("wl_{event_id}"),
        }
    }

    /// DDL creating every table and index of the event. Idempotent.
    #[must_use]
    pub fn create_statements(&self, with_chapters: bool) -> Vec<String> {
        let main = &self.rankings;
        let users = &self.identities;
        let mut statements = vec![
            format!(
                "CREATE TABLE IF NOT EXISTS \"{main}\" (\
                 timestamp INTEGER NOT NULL, \
                 user_id TEXT NOT NULL, \
                 score INTEGER NOT NULL, \
                 \"rank\" INTEGER NOT NULL, \
                 PRIMARY KEY (timestamp, user_id))"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS \"{main}_rank_idx\" ON \"{main}\" (\"rank\", timestamp)"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS \"{main}_user_idx\" ON \"{main}\" (user_id, timestamp)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS \"{users}\" (\
                 user_id TEXT PRIMARY KEY, \
                 name TEXT NOT NULL, \
                 cheerful_team_id INTEGER)"
            ),
        ];
        if with_chapters {
            let wl = &self.chapter_rankings;
            statements.extend([
                format!(
                    "CREATE TABLE IF NOT EXISTS \"{wl}\" (\
                     timestamp INTEGER NOT NULL, \
                     user_id TEXT NOT NULL, \
                     character_id INTEGER NOT NULL, \
                     score INTEGER NOT NULL, \
                     \"rank\" INTEGER NOT NULL, \
                     PRIMARY KEY (timestamp, user_id, character_id))"
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS \"{wl}_rank_idx\" ON \"{wl}\" (character_id, \"rank\", timestamp)"
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS \"{wl}_user_idx\" ON \"{wl}\" (character_id, user_id, timestamp)"
                ),
            ]);
        }
        statements
    }
}

/// Memoized [`EventTables`] per event id.
///
/// Concurrent lookups for the same id resolve to the same `Arc`.
#[derive(Debug, Default)]
pub struct TableCatalog {
    tables: RwLock<HashMap<i64, Arc<EventTables>>>,
}

impl TableCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tables of `event_id`, creating the entry on first use.
    pub async fn tables(&self, event_id: i64) -> Arc<EventTables> {
        if let Some(tables) = self.tables.read().await.get(&event_id) {
            return Arc::clone(tables);
        }
        let mut map = self.tables.write().await;
        Arc::clone(
            map.entry(event_id)
                .or_insert_with(|| Arc::new(EventTables::for_event(event_id))),
        )
    }

    /// Number of memoized events.
    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Returns `true` if nothing has been memoized yet.
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}
