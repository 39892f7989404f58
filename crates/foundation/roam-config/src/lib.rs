//! Roam configuration
//!
//! Loaded from `~/.config/roam/config.yaml` (or an explicit path), with
//! environment overrides applied on top. A missing file yields defaults.
//!
//! ```yaml
//! feed:
//!   page_size: 20
//!   discovery_limit: 50
//!   stale_after_secs: 300
//! realtime:
//!   mode: poll
//!   poll_interval_ms: 30000
//! photos:
//!   place_photo_url_template: "https://maps.example.com/photo?ref={reference}"
//! logging:
//!   filter: "roam=debug"
//!   json: false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PAGE_SIZE: &str = "ROAM_PAGE_SIZE";
pub const ENV_DISCOVERY_LIMIT: &str = "ROAM_DISCOVERY_LIMIT";
pub const ENV_POLL_INTERVAL_MS: &str = "ROAM_POLL_INTERVAL_MS";
pub const ENV_LOG: &str = "ROAM_LOG";

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoamConfig {
    pub feed: FeedConfig,
    pub realtime: RealtimeConfig,
    pub photos: PhotoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Activity items requested per page
    pub page_size: usize,
    /// Upper bound on public items returned in discovery mode
    pub discovery_limit: usize,
    /// A loaded feed older than this is refetched by `load_feed`
    pub stale_after_secs: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            discovery_limit: 50,
            stale_after_secs: None,
        }
    }
}

impl FeedConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }
}

/// How the realtime watcher learns about new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeMode {
    /// Push when the source supports it, otherwise poll
    #[default]
    Auto,
    Push,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub mode: RealtimeMode,
    pub poll_interval_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            mode: RealtimeMode::Auto,
            poll_interval_ms: 30_000,
        }
    }
}

impl RealtimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// URL template for place photo references; `{reference}` is substituted
    pub place_photo_url_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "roam=info".to_string(),
            json: false,
        }
    }
}

impl RoamConfig {
    /// Default config file location (~/.config/roam/config.yaml)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roam")
            .join("config.yaml")
    }

    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load from `path` (defaults if missing), then apply environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file without applying overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply `ROAM_*` overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_PAGE_SIZE) {
            self.feed.page_size = parse_override(ENV_PAGE_SIZE, &v)?;
        }
        if let Some(v) = lookup(ENV_DISCOVERY_LIMIT) {
            self.feed.discovery_limit = parse_override(ENV_DISCOVERY_LIMIT, &v)?;
        }
        if let Some(v) = lookup(ENV_POLL_INTERVAL_MS) {
            self.realtime.poll_interval_ms = parse_override(ENV_POLL_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG) {
            self.logging.filter = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.page_size == 0 {
            return Err(ConfigError::Invalid("feed.page_size must be > 0".into()));
        }
        if self.realtime.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "realtime.poll_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        })
}
