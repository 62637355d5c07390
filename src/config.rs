//! Tracker configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Per-server settings use the upper-case
//! server name as suffix, e.g. `DATABASE_URL_JP` or `MASTER_DATA_DIR_EN`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::ServerRegion;
use crate::error::TrackerError;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(TrackerError::Config(format!("unknown log format: {other}"))),
        }
    }
}

/// Settings for a single tracked server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Server region.
    pub server: ServerRegion,
    /// Directory holding `events.json` and `worldBlooms.json`.
    pub master_data_dir: PathBuf,
    /// SQLite connection string for this server's ranking store.
    pub database_url: String,
}

/// Top-level tracker configuration.
///
/// Loaded once at startup via [`TrackerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Socket address the query API binds to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Whether the query API is served at all.
    pub api_enabled: bool,

    /// Base URL of the upstream ranking API.
    pub api_endpoint: String,

    /// Optional token sent with every upstream request.
    pub api_token: Option<String>,

    /// Timeout applied to every upstream request.
    pub upstream_timeout: Duration,

    /// Period of the orchestrator tick.
    pub tick_interval: Duration,

    /// Maximum number of connections per server store.
    pub database_max_connections: u32,

    /// Lifetime of a memoized query response.
    pub response_cache_ttl: Duration,

    /// Tracing output format.
    pub log_format: LogFormat,

    /// Enabled servers, in configuration order.
    pub servers: Vec<ServerSettings>,
}

impl TrackerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] if `LISTEN_ADDR` cannot be parsed,
    /// `TRACKER_SERVERS` names an unknown or duplicate server, or
    /// `LOG_FORMAT` is not recognised.
    pub fn from_env() -> Result<Self, TrackerError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`TrackerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TrackerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| TrackerError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let api_enabled = parse_bool(lookup("API_ENABLED"), true);

        let api_endpoint = lookup("SEKAI_API_ENDPOINT")
            .unwrap_or_else(|| "http://127.0.0.1:9000/api".to_string());
        let api_token = lookup("SEKAI_API_TOKEN").filter(|t| !t.trim().is_empty());

        let upstream_timeout = Duration::from_secs(parse_or(lookup("UPSTREAM_TIMEOUT_SECS"), 20));
        let tick_interval =
            Duration::from_secs(parse_or(lookup("TRACKER_INTERVAL_SECS"), 60).max(1));
        let database_max_connections = parse_or(lookup("DATABASE_MAX_CONNECTIONS"), 5);
        let response_cache_ttl =
            Duration::from_secs(parse_or(lookup("RESPONSE_CACHE_TTL_SECS"), 60).max(1));

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        let servers = parse_servers(
            &lookup("TRACKER_SERVERS").unwrap_or_else(|| "jp".to_string()),
            &lookup,
        )?;

        Ok(Self {
            listen_addr,
            api_enabled,
            api_endpoint,
            api_token,
            upstream_timeout,
            tick_interval,
            database_max_connections,
            response_cache_ttl,
            log_format,
            servers,
        })
    }
}

fn parse_servers<F>(raw: &str, lookup: &F) -> Result<Vec<ServerSettings>, TrackerError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut servers: Vec<ServerSettings> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let server: ServerRegion = name
            .parse()
            .map_err(|_| TrackerError::Config(format!("unknown server in TRACKER_SERVERS: {name}")))?;
        if servers.iter().any(|s| s.server == server) {
            return Err(TrackerError::Config(format!(
                "server listed twice in TRACKER_SERVERS: {server}"
            )));
        }
        let suffix = server.env_suffix();
        let master_data_dir = lookup(&format!("MASTER_DATA_DIR_{suffix}"))
            .map_or_else(|| PathBuf::from(format!("./data/master/{server}")), PathBuf::from);
        let database_url = lookup(&format!("DATABASE_URL_{suffix}"))
            .unwrap_or_else(|| format!("sqlite://./data/{server}_event.db?mode=rwc"));
        servers.push(ServerSettings {
            server,
            master_data_dir,
            database_url,
        });
    }
    if servers.is_empty() {
        return Err(TrackerError::Config(
            "TRACKER_SERVERS must name at least one server".into(),
        ));
    }
    Ok(servers)
}

/// Parses a raw value as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parses a raw value as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_bool(raw: Option<String>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_track_jp_only() {
        let Ok(config) = TrackerConfig::from_lookup(lookup_from(&[])) else {
            panic!("defaults should load");
        };
        assert_eq!(config.listen_addr.port(), 8080);
        assert!(config.api_enabled);
        assert_eq!(config.upstream_timeout, Duration::from_secs(20));
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.response_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.api_token.is_none());
        assert_eq!(config.servers.len(), 1);
        let Some(jp) = config.servers.first() else {
            panic!("jp should be configured");
        };
        assert_eq!(jp.server, ServerRegion::Jp);
        assert_eq!(jp.database_url, "sqlite://./data/jp_event.db?mode=rwc");
        assert_eq!(jp.master_data_dir, PathBuf::from("./data/master/jp"));
    }

    #[test]
    fn per_server_overrides_apply() {
        let Ok(config) = TrackerConfig::from_lookup(lookup_from(&[
            ("TRACKER_SERVERS", "jp, en"),
            ("DATABASE_URL_EN", "sqlite::memory:"),
            ("MASTER_DATA_DIR_EN", "/srv/master/en"),
            ("SEKAI_API_TOKEN", "secret"),
            ("LOG_FORMAT", "JSON"),
            ("API_ENABLED", "0"),
            ("RESPONSE_CACHE_TTL_SECS", "15"),
        ])) else {
            panic!("config should load");
        };
        assert!(!config.api_enabled);
        assert_eq!(config.response_cache_ttl, Duration::from_secs(15));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        let Some(en) = config.servers.get(1) else {
            panic!("en should be configured");
        };
        assert_eq!(en.server, ServerRegion::En);
        assert_eq!(en.database_url, "sqlite::memory:");
        assert_eq!(en.master_data_dir, PathBuf::from("/srv/master/en"));
    }

    #[test]
    fn unknown_server_is_rejected() {
        let result = TrackerConfig::from_lookup(lookup_from(&[("TRACKER_SERVERS", "jp,xx")]));
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn duplicate_server_is_rejected() {
        let result = TrackerConfig::from_lookup(lookup_from(&[("TRACKER_SERVERS", "jp,JP")]));
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let Ok(config) = TrackerConfig::from_lookup(lookup_from(&[
            ("TRACKER_INTERVAL_SECS", "soon"),
            ("DATABASE_MAX_CONNECTIONS", "-3"),
        ])) else {
            panic!("config should load");
        };
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.database_max_connections, 5);
    }
}
