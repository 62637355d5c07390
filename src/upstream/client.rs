//! HTTP client for the upstream ranking API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::RankingSource;
use super::wire::{BorderRankingResponse, TopRankingResponse};
use crate::domain::{RankingView, ServerRegion};
use crate::error::TrackerError;

/// Header carrying the upstream API token.
pub const TOKEN_HEADER: &str = "x-haruki-sekai-token";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("sekai-event-tracker/", env!("CARGO_PKG_VERSION"));

/// Upstream API client shared by every server's tracker.
#[derive(Debug, Clone)]
pub struct SekaiApiClient {
    endpoint: String,
    client: Client,
}

impl SekaiApiClient {
    /// Creates a client for `endpoint`.
    ///
    /// An empty or absent `token` sends no token header.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] if the token is not a valid header
    /// value or the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(token)
                .map_err(|e| TrackerError::Config(format!("invalid upstream token: {e}")))?;
            headers.insert(HeaderName::from_static(TOKEN_HEADER), value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, server: ServerRegion, event_id: i64, view: &str) -> String {
        format!("{}/{server}/event/{event_id}/{view}", self.endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TrackerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TrackerError::UpstreamFetch(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "upstream returned non-success status");
            return Err(TrackerError::UpstreamFetch(format!(
                "GET {url} returned {status}"
            )));
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| TrackerError::UpstreamFetch(format!("GET {url} bad payload: {e}")))?;
        debug!(%url, "upstream payload received");
        Ok(body)
    }
}

#[async_trait]
impl RankingSource for SekaiApiClient {
    async fn fetch_top(
        &self,
        server: ServerRegion,
        event_id: i64,
    ) -> Result<RankingView, TrackerError> {
        let url = self.url(server, event_id, "ranking-top100");
        let response: TopRankingResponse = self.get_json(&url).await?;
        Ok(response.into())
    }

    async fn fetch_border(
        &self,
        server: ServerRegion,
        event_id: i64,
    ) -> Result<RankingView, TrackerError> {
        let url = self.url(server, event_id, "ranking-border");
        let response: BorderRankingResponse = self.get_json(&url).await?;
        Ok(response.into())
    }
}
