//! Persistence layer: per-server SQLite ranking stores.
//!
//! Every server owns one [`RankingStore`]. Each tracked event gets its own
//! set of tables (see [`schema`]); one recording cycle is written in a
//! single transaction.

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{
    CycleRows, PlayerIdentityRecord, RankingFilter, RankingLine, RankingRecord, ScoreGrowth,
};
pub use schema::{EventTables, TableCatalog};
pub use sqlite::{CycleWriteSummary, RankingStore};
