//! The persisted Atom feed: the only state kept between runs.
//!
//! - `recovery` - rebuilds entries from the previously written document
//! - `reconcile` - novelty filter and retention trim
//! - `render` - new catalogue records to feed entries
//! - `writer` - Atom serialization and atomic file replacement
//!
//! # Example
//!
//! ```ignore
//! let mut entries = recover_entries(&config.feed_path)?;
//! let novel = novel_records(discovered, &entries);
//! trim_expired(&mut entries, retention_cutoff(now, config.retention_window()), config.retention_mode);
//! entries.extend(EntryRenderer::new(&config).render_all(novel, now));
//! write_feed(&config.feed_path, &FeedMetadata::from(&config), &entries, now)?;
//! ```

mod entry;
mod reconcile;
mod recovery;
mod render;
mod writer;

pub use entry::{FeedEntry, FeedError, FeedMetadata};
pub use reconcile::{novel_records, retention_cutoff, trim_expired};
pub use recovery::{parse_feed_document, recover_entries};
pub use render::EntryRenderer;
pub use writer::{render_document, write_feed};
