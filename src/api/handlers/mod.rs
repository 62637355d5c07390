//! REST endpoint handlers organized by resource.
//!
//! Every event endpoint lives under `/event/{server}/{event_id}` and shares
//! the helpers below: the server segment resolves to its store, the event
//! must have been provisioned, and successful bodies are memoized per
//! server until the next committed cycle.

pub mod lines;
pub mod ranking;
pub mod system;

use std::future::Future;

use axum::extract::OriginalUri;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::app_state::AppState;
use crate::domain::ServerRegion;
use crate::error::TrackerError;
use crate::persistence::RankingStore;

/// Composes all event query routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(ranking::routes())
        .merge(lines::routes())
}

/// Fails with [`TrackerError::NotFound`] unless `event_id` has been
/// recorded on `server`.
async fn ensure_event(
    store: &RankingStore,
    server: ServerRegion,
    event_id: i64,
) -> Result<(), TrackerError> {
    if store.event_exists(event_id).await? {
        Ok(())
    } else {
        Err(TrackerError::NotFound(format!(
            "event {event_id} has no records on {server}"
        )))
    }
}

/// Serves the memoized body of `uri` or computes, stores and serves it.
///
/// Errors are never memoized. The namespace generation is read before
/// computing so a body racing a committed cycle is not kept.
async fn memoized<T, Fut>(
    state: &AppState,
    server: ServerRegion,
    uri: &OriginalUri,
    compute: Fut,
) -> Result<Json<Value>, TrackerError>
where
    T: Serialize,
    Fut: Future<Output = Result<T, TrackerError>>,
{
    let key = uri.0.path();
    if let Some(hit) = state.response_cache.get(server.as_str(), key).await {
        return Ok(Json(hit));
    }
    let generation = state.response_cache.generation(server.as_str()).await;
    let body = serde_json::to_value(compute.await?)
        .map_err(|e| TrackerError::Internal(format!("response serialization: {e}")))?;
    state
        .response_cache
        .put(server.as_str(), key, body.clone(), generation)
        .await;
    Ok(Json(body))
}
