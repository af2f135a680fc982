//! Catalogue traversal: fetching listing pages and extracting the records
//! embedded in them.
//!
//! - [`fetcher`] - HTTP transport behind the [`PageSource`] trait
//! - [`extract`] - `mediaItems` and "Next page" extraction from page markup
//! - [`record`] - typed records and the raw-to-typed mapping step
//! - [`paginator`] - sequential page walk accumulating records by id

mod extract;
mod fetcher;
mod paginator;
mod record;

pub use extract::{CataloguePage, PageExtractor};
pub use fetcher::{FetchError, HttpPageSource, PageSource};
pub use paginator::{collect_records, CatalogueError, Traversal};
pub use record::{CatalogueRecord, CoverPreference, ExtractError, RawRecord, UNKNOWN_CREATOR};
