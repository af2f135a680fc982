use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::config::Config;

/// Errors reading or writing the persisted feed.
///
/// Any read error means the feed cannot be trusted as seen-item history, so
/// callers must stop rather than start from an empty feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to read feed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Document is not an Atom feed (root element is not <feed>)")]
    NotAtom,

    #[error("Feed entry {index} is missing <{field}>")]
    MissingField { index: usize, field: &'static str },

    #[error("Feed entry {index} has an invalid <{field}> timestamp {value:?}: {source}")]
    InvalidTimestamp {
        index: usize,
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to write feed: {0}")]
    Write(String),
}

/// One persisted feed entry. Every field round-trips through the feed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Catalogue record id; stable across runs.
    pub id: String,
    pub title: String,
    pub link: String,
    /// HTML fragment, stored as `type="html"` content.
    pub content: String,
    pub published: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
}

/// Feed-level elements written ahead of the entries.
#[derive(Debug, Clone)]
pub struct FeedMetadata {
    pub id: String,
    pub title: String,
    pub author_name: String,
    pub author_email: Option<String>,
}

impl From<&Config> for FeedMetadata {
    fn from(config: &Config) -> Self {
        Self {
            id: config.feed_id.clone(),
            title: config.feed_title.clone(),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }
}
