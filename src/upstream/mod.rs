//! Upstream ranking API access.
//!
//! [`RankingSource`] is the seam between the trackers and the network;
//! [`SekaiApiClient`] is the production implementation.

pub mod client;
pub mod wire;

use async_trait::async_trait;

pub use client::SekaiApiClient;

use crate::domain::{RankingView, ServerRegion};
use crate::error::TrackerError;

/// Provider of the two upstream leaderboard views of an event.
#[async_trait]
pub trait RankingSource: Send + Sync + std::fmt::Debug {
    /// Fetches the top-100 view (main plus chapter leaderboards).
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UpstreamFetch`] on transport failure,
    /// non-success status or malformed payload.
    async fn fetch_top(&self, server: ServerRegion, event_id: i64)
    -> Result<RankingView, TrackerError>;

    /// Fetches the border view (milestone ranks beyond the top 100).
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UpstreamFetch`] on transport failure,
    /// non-success status or malformed payload.
    async fn fetch_border(
        &self,
        server: ServerRegion,
        event_id: i64,
    ) -> Result<RankingView, TrackerError>;
}
