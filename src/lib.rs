//! # sekai-event-tracker
//!
//! Tracks live event leaderboards across independent regional game servers
//! and persists a per-event time-series of rank and score per player.
//!
//! Every enabled server owns one [`service::TrackerDaemon`]. On each
//! orchestrator tick the daemon derives the live event and its phase from
//! master data, drives its [`service::EventTracker`] through the event
//! lifecycle, fetches both upstream ranking views, merges them and writes
//! one transactional snapshot into the server's store.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator (service/)          periodic tick, one task per server
//!     │
//!     ├── TrackerRegistry          one daemon slot per server
//!     ├── TrackerDaemon            lifecycle state machine
//!     │      ├── MasterDataParser  (master_data/)
//!     │      ├── EventTracker      merge + record
//!     │      │      ├── RankingSource (upstream/)
//!     │      │      └── RankingStore  (persistence/)
//!     │      └── ResponseCache     invalidated after each commit
//!     │
//! Query API (api/)                 read helpers over RankingStore
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod master_data;
pub mod persistence;
pub mod service;
pub mod upstream;
