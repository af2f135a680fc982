use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use super::extract::PageExtractor;
use super::fetcher::{FetchError, PageSource};
use super::record::{CatalogueRecord, ExtractError};

/// Errors that abort a catalogue traversal.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to extract records from {url}: {source}")]
    Extract {
        url: String,
        #[source]
        source: ExtractError,
    },

    /// Safeguard against an upstream pagination loop.
    #[error("Catalogue still paginating after {0} pages")]
    PageLimitExceeded(usize),
}

/// Outcome of walking the catalogue from the seed page.
#[derive(Debug, Default)]
pub struct Traversal {
    /// Union of every page's records; a later page wins on id collision.
    pub records: BTreeMap<String, CatalogueRecord>,
    /// Pages fetched, in visit order.
    pub visited: Vec<String>,
}

/// Walks the catalogue starting at `seed_url`, following "Next page" links
/// until a page has none.
///
/// Pages are fetched strictly one after another. Any fetch or extraction
/// failure aborts the whole traversal. `max_pages == 0` disables the page
/// limit; a link back to an already visited page ends the walk.
pub async fn collect_records<S: PageSource>(
    source: &S,
    extractor: &PageExtractor,
    seed_url: &str,
    max_pages: usize,
) -> Result<Traversal, CatalogueError> {
    let mut traversal = Traversal::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current = Some(seed_url.to_string());

    while let Some(url) = current.take() {
        if max_pages > 0 && traversal.visited.len() >= max_pages {
            return Err(CatalogueError::PageLimitExceeded(max_pages));
        }

        tracing::info!(url = %url, "Fetching catalogue page");
        let markup = source
            .fetch_page(&url)
            .await
            .map_err(|source| CatalogueError::Fetch {
                url: url.clone(),
                source,
            })?;

        let page = extractor
            .extract(&url, &markup)
            .map_err(|source| CatalogueError::Extract {
                url: url.clone(),
                source,
            })?;

        for record in page.records.values() {
            tracing::debug!(id = %record.id, title = %record.title, "Found catalogue record");
        }
        tracing::info!(url = %url, records = page.records.len(), "Extracted catalogue page");

        traversal.records.extend(page.records);
        seen.insert(url.clone());
        traversal.visited.push(url);

        current = match page.next_page_url {
            Some(next) if seen.contains(&next) => {
                tracing::warn!(url = %next, "Next page link points to a visited page, stopping");
                None
            }
            next => next,
        };
    }

    Ok(traversal)
}
