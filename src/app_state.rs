//! Shared application state injected into all Axum handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ResponseCache, ServerRegion};
use crate::error::TrackerError;
use crate::persistence::RankingStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Ranking store of every enabled server.
    pub stores: Arc<HashMap<ServerRegion, RankingStore>>,
    /// Response memo shared with the trackers.
    pub response_cache: ResponseCache,
}

impl AppState {
    /// Creates the state from the enabled servers' stores.
    #[must_use]
    pub fn new(stores: HashMap<ServerRegion, RankingStore>, response_cache: ResponseCache) -> Self {
        Self {
            stores: Arc::new(stores),
            response_cache,
        }
    }

    /// Resolves a path segment to an enabled server and its store.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownServer`] if the name is not a known
    /// region or the region is not enabled.
    pub fn store(&self, server: &str) -> Result<(ServerRegion, &RankingStore), TrackerError> {
        let region: ServerRegion = server.parse()?;
        self.stores
            .get(&region)
            .map(|store| (region, store))
            .ok_or_else(|| TrackerError::UnknownServer(format!("{region} is not enabled")))
    }
}
