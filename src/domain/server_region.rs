//! Server region identifier.
//!
//! [`ServerRegion`] names one independent game server. It keys the
//! tracker registry, the ranking stores, the upstream URLs and the
//! response-cache namespaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::TrackerError;

/// One of the regional game servers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ServerRegion {
    /// Japan.
    Jp,
    /// Global (English).
    En,
    /// Taiwan.
    Tw,
    /// Korea.
    Kr,
    /// China.
    Cn,
}

impl ServerRegion {
    /// All known regions.
    pub const ALL: [Self; 5] = [Self::Jp, Self::En, Self::Tw, Self::Kr, Self::Cn];

    /// Lower-case name used in URLs, table paths and cache namespaces.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jp => "jp",
            Self::En => "en",
            Self::Tw => "tw",
            Self::Kr => "kr",
            Self::Cn => "cn",
        }
    }

    /// Upper-case suffix used by per-server environment variables.
    #[must_use]
    pub const fn env_suffix(&self) -> &'static str {
        match self {
            Self::Jp => "JP",
            Self::En => "EN",
            Self::Tw => "TW",
            Self::Kr => "KR",
            Self::Cn => "CN",
        }
    }
}

impl fmt::Display for ServerRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerRegion {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|region| region.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TrackerError::UnknownServer(wanted.to_string()))
    }
}
