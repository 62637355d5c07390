//! sekai-event-tracker entry point.
//!
//! Wires one store and one tracker daemon per enabled server, runs the
//! orchestrator loop in the background and serves the query API until
//! Ctrl-C.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sekai_event_tracker::api;
use sekai_event_tracker::app_state::AppState;
use sekai_event_tracker::config::{LogFormat, TrackerConfig};
use sekai_event_tracker::domain::ResponseCache;
use sekai_event_tracker::master_data::MasterDataParser;
use sekai_event_tracker::persistence::RankingStore;
use sekai_event_tracker::service::{Orchestrator, TrackerDaemon, TrackerRegistry};
use sekai_event_tracker::upstream::{RankingSource, SekaiApiClient};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = TrackerConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format);
    tracing::info!(
        servers = config.servers.len(),
        tick_secs = config.tick_interval.as_secs(),
        "starting sekai-event-tracker"
    );

    // Build upstream and persistence
    let source: Arc<dyn RankingSource> = Arc::new(
        SekaiApiClient::new(
            &config.api_endpoint,
            config.api_token.as_deref(),
            config.upstream_timeout,
        )
        .context("building upstream client")?,
    );

    let registry = Arc::new(TrackerRegistry::new());
    let mut stores = HashMap::new();
    for settings in &config.servers {
        let store = RankingStore::connect(&settings.database_url, config.database_max_connections)
            .await
            .with_context(|| format!("opening store for {}", settings.server))?;
        let parser = MasterDataParser::new(settings.server, &settings.master_data_dir);
        registry
            .insert(TrackerDaemon::new(settings.server, parser, store.clone()))
            .await?;
        stores.insert(settings.server, store);
        tracing::info!(
            server = %settings.server,
            master_data = %settings.master_data_dir.display(),
            "server enabled"
        );
    }

    // Start the tracking loop
    let response_cache = ResponseCache::with_ttl(config.response_cache_ttl);
    let orchestrator = Orchestrator::new(registry, source, response_cache.clone());
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let tracking = tokio::spawn(orchestrator.run(config.tick_interval, async move {
        let _ = stop_rx.changed().await;
    }));

    // Serve the query API
    let app_state = AppState::new(stores, response_cache);
    if config.api_enabled {
        let app = Router::new().merge(api::build_router());
        #[cfg(feature = "swagger-ui")]
        let app = app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", <api::ApiDoc as utoipa::OpenApi>::openapi()),
        );
        let app = app
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .with_state(app_state.clone());

        let listener = tokio::net::TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("binding {}", config.listen_addr))?;
        tracing::info!(addr = %config.listen_addr, "server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("serving query api")?;
    } else {
        tracing::info!("query api disabled");
        shutdown_signal().await;
    }

    // Stop the loop and release the stores
    let _ = stop_tx.send(true);
    if let Err(e) = tracking.await {
        tracing::warn!(error = %e, "tracking loop ended abnormally");
    }
    for store in app_state.stores.values() {
        store.close().await;
    }
    tracing::info!("shutdown complete");

    Ok(())
}
