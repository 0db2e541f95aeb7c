//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]     # pricing service connection
//! [search]     # default passengers and currency
//! [prefetch]   # neighbor window loading
//! [matrix]     # cache behavior
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default pricing service address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

/// Default timeout for one-shot requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default timeout for a whole streaming request, in seconds.
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 120;

/// Default currency for searches.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Default pause before prefetch starts, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceGridConfig {
    /// Pricing service connection.
    pub server: Option<ServerConfig>,

    /// Default search parameters.
    pub search: Option<SearchConfig>,

    /// Background prefetch of neighboring windows.
    pub prefetch: Option<PrefetchConfig>,

    /// Matrix cache behavior.
    pub matrix: Option<MatrixSection>,
}

impl PriceGridConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: PriceGridConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.search.is_some() {
            self.search = other.search;
        }

        if other.prefetch.is_some() {
            self.prefetch = other.prefetch;
        }

        if other.matrix.is_some() {
            self.matrix = other.matrix;
        }
    }

    /// Server settings, or defaults when the section is absent.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Search settings, or defaults when the section is absent.
    pub fn search(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }

    /// Prefetch settings, or defaults when the section is absent.
    pub fn prefetch(&self) -> PrefetchConfig {
        self.prefetch.clone().unwrap_or_default()
    }

    /// Matrix settings, or defaults when the section is absent.
    pub fn matrix(&self) -> MatrixSection {
        self.matrix.clone().unwrap_or_default()
    }

    /// A copy with every section present, absent ones filled with defaults.
    pub fn resolved(&self) -> Self {
        Self {
            server: Some(self.server()),
            search: Some(self.search()),
            prefetch: Some(self.prefetch()),
            matrix: Some(self.matrix()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Pricing service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the pricing service.
    pub base_url: String,
    /// Timeout for one-shot requests.
    pub timeout_secs: u64,
    /// Timeout for a whole streaming request.
    pub stream_timeout_secs: u64,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl ServerConfig {
    /// One-shot request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Streaming request timeout.
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Passenger counts and currency sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub currency: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prefetch / Matrix Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Background loading of the four neighboring windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Whether prefetch runs at all.
    pub enabled: bool,
    /// Pause after the primary window drains, in milliseconds.
    pub settle_delay_ms: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl PrefetchConfig {
    /// Settle delay as a duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Matrix cache behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixSection {
    /// Cache pairs a finished stream never answered as confirmed absent,
    /// instead of retrying them next time.
    pub mark_unanswered_absent: bool,
}
