//! Configuration for the feed client and the MCP endpoint.
//!
//! Values are layered: built-in defaults, then the optional TOML file
//! (`~/.config/hatena-blog-mcp/config.toml`), then the `BLOG_ID` and
//! `CACHE_DURATION` environment variables, then command-line flags.
//! A missing file yields `Config::default()`. Unknown keys are ignored with a
//! warning.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Blog identifier used when none is configured.
pub const DEFAULT_BLOG_ID: &str = "example";
/// Cache duration in seconds used when none is configured.
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 300;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hatena Blog identifier; the feed lives at `https://{blog_id}.hatenablog.com/rss`.
    pub blog_id: String,

    /// How long a fetched feed is served from memory, in seconds.
    pub cache_duration: u64,

    /// Explicit feed URL. Overrides the one derived from `blog_id`.
    pub feed_url: Option<String>,

    /// Socket address the MCP endpoint binds to.
    pub listen_addr: String,

    /// Time budget for one feed download, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blog_id: DEFAULT_BLOG_ID.to_string(),
            cache_duration: DEFAULT_CACHE_DURATION_SECS,
            feed_url: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "blog_id",
        "cache_duration",
        "feed_url",
        "listen_addr",
        "request_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            blog_id = %config.blog_id,
            cache_duration = config.cache_duration,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text. Blank text yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Apply `BLOG_ID` and `CACHE_DURATION` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored. A `CACHE_DURATION` that is not a positive
    /// integer keeps the current value.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(blog_id) = lookup("BLOG_ID").filter(|v| !v.trim().is_empty()) {
            self.blog_id = blog_id.trim().to_string();
        }

        if let Some(raw) = lookup("CACHE_DURATION").filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.cache_duration = secs,
                _ => tracing::warn!(
                    value = %raw,
                    fallback = self.cache_duration,
                    "Ignoring invalid CACHE_DURATION"
                ),
            }
        }
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_duration)
    }

    /// Download time budget; a zero setting falls back to the default.
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
