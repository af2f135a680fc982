//! Configuration file parser for `shelfwatch.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which targets the downloadLibrary "added in the last 7 days" view.
//! Unknown keys are accepted by serde but logged as potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// How expired entries are removed from the recovered feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionMode {
    /// Find the oldest entry still inside the window (in append order) and
    /// drop everything positioned before it.
    #[default]
    BoundaryScan,
    /// Drop every entry whose published timestamp is before the cutoff.
    Timestamp,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalogue listing to start from. Must carry the date-window filter.
    pub seed_url: String,

    /// Base used to build entry links (`<base>/media/<id>`).
    pub media_base_url: String,

    /// Library name shown in entry titles and content.
    pub library_name: String,

    /// Location of the persisted Atom feed.
    pub feed_path: PathBuf,

    pub feed_id: String,
    pub feed_title: String,
    pub author_name: String,
    pub author_email: Option<String>,

    /// Entries published longer ago than this are dropped.
    pub retention_days: u32,

    pub retention_mode: RetentionMode,

    /// Cover variant used when a record offers several.
    pub preferred_cover_key: String,

    /// Stock image used when a record has no covers at all.
    pub fallback_cover_url: String,

    /// Query fragment a "Next page" link must contain to be followed.
    pub date_window_marker: String,

    pub goodreads_search_url: String,

    /// Pagination safeguard. 0 disables the limit.
    pub max_pages: usize,

    pub request_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed_url: "https://downloadlibrary.overdrive.com/collection/1067423?addedDate=days-0-7&language=en&maturityLevel=generalcontent&maturityLevel=youngadult".to_string(),
            media_base_url: "https://downloadlibrary.overdrive.com".to_string(),
            library_name: "downloadLibrary".to_string(),
            feed_path: PathBuf::from("atom.xml"),
            feed_id: "urn:shelfwatch:new-ebooks-at-downloadlibrary".to_string(),
            feed_title: "New e-books at downloadLibrary".to_string(),
            author_name: "shelfwatch".to_string(),
            author_email: None,
            retention_days: 90,
            retention_mode: RetentionMode::BoundaryScan,
            preferred_cover_key: "cover150Wide".to_string(),
            fallback_cover_url: "https://source.unsplash.com/random/150x200".to_string(),
            date_window_marker: "days-0-7".to_string(),
            goodreads_search_url: "https://www.goodreads.com/search".to_string(),
            max_pages: 100,
            request_timeout_secs: 30,
            user_agent: concat!("shelfwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 17] = [
        "seed_url",
        "media_base_url",
        "library_name",
        "feed_path",
        "feed_id",
        "feed_title",
        "author_name",
        "author_email",
        "retention_days",
        "retention_mode",
        "preferred_cover_key",
        "fallback_cover_url",
        "date_window_marker",
        "goodreads_search_url",
        "max_pages",
        "request_timeout_secs",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
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
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml_str(&content, path)
    }

    fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            path = %path.display(),
            feed = %config.feed_path.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Retention window as a chrono duration.
    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Link to a record's page in the catalogue.
    pub fn media_url(&self, id: &str) -> String {
        format!("{}/media/{}", self.media_base_url.trim_end_matches('/'), id)
    }
}

// ============================================================================
// Tests
// ============================================================================
