use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

use super::record::{CatalogueRecord, CoverPreference, ExtractError};
use crate::config::Config;

/// `<namespace>.mediaItems = {...};` on a single line of page script.
static MEDIA_ITEMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*\.mediaItems\s*=\s*([^\n]+);")
        .expect("media items pattern is valid")
});

/// One fetched listing page after extraction.
#[derive(Debug, Clone)]
pub struct CataloguePage {
    pub url: String,
    pub records: BTreeMap<String, CatalogueRecord>,
    pub next_page_url: Option<String>,
}

/// Pulls records and pagination links out of catalogue markup.
#[derive(Debug)]
pub struct PageExtractor {
    next_page_re: Regex,
    preferred_cover_key: String,
    fallback_cover_url: String,
}

impl PageExtractor {
    pub fn new(config: &Config) -> Self {
        Self::with_marker(
            &config.date_window_marker,
            &config.preferred_cover_key,
            &config.fallback_cover_url,
        )
    }

    pub fn with_marker(marker: &str, preferred_cover_key: &str, fallback_cover_url: &str) -> Self {
        // Greedy `.*` stays on one line, so the last qualifying href after
        // "Next page" on that line is taken.
        let pattern = format!(
            r#"Next page.*href="([^"]*{}[^"]*)""#,
            regex::escape(marker)
        );
        Self {
            next_page_re: Regex::new(&pattern).expect("escaped marker forms a valid pattern"),
            preferred_cover_key: preferred_cover_key.to_string(),
            fallback_cover_url: fallback_cover_url.to_string(),
        }
    }

    /// Extracts one page. `url` is the address the markup was fetched from.
    pub fn extract(&self, url: &str, markup: &str) -> Result<CataloguePage, ExtractError> {
        Ok(CataloguePage {
            url: url.to_string(),
            records: self.extract_records(markup)?,
            next_page_url: self.find_next_page_url(markup, url),
        })
    }

    /// Parses the embedded `mediaItems` block into records keyed by record id.
    ///
    /// A page without the block has no new items and yields an empty map.
    pub fn extract_records(
        &self,
        markup: &str,
    ) -> Result<BTreeMap<String, CatalogueRecord>, ExtractError> {
        let Some(captures) = MEDIA_ITEMS_RE.captures(markup) else {
            return Ok(BTreeMap::new());
        };

        let items: Map<String, Value> = serde_json::from_str(captures[1].trim())?;
        let preference = CoverPreference {
            preferred_key: &self.preferred_cover_key,
            fallback_url: &self.fallback_cover_url,
        };

        items
            .into_values()
            .map(|value| {
                CatalogueRecord::from_value(value, preference).map(|record| (record.id.clone(), record))
            })
            .collect()
    }

    /// Finds the "Next page" link that keeps the date-window filter and
    /// resolves it against `page_url`.
    pub fn find_next_page_url(&self, markup: &str, page_url: &str) -> Option<String> {
        let captures = self.next_page_re.captures(markup)?;
        let href = html_escape::decode_html_entities(&captures[1]);

        match Url::parse(page_url).and_then(|base| base.join(&href)) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                tracing::warn!(href = %href, page = %page_url, error = %e, "Unable to resolve next page link");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE_URL: &str = "https://library.example/collection/1?addedDate=days-0-7&language=en";

    fn extractor() -> PageExtractor {
        PageExtractor::with_marker("days-0-7", "cover150Wide", "https://stock.example/c.jpg")
    }

    fn page_with_items(items: &str) -> String {
        format!(
            "<html><head><script>\nwindow.OverDrive = window.OverDrive || {{}};\n\
             window.OverDrive.mediaItems = {items};\nwindow.OverDrive.thunderHost = \"x\";\n\
             </script></head><body></body></html>"
        )
    }

    #[test]
    fn test_extract_records_from_media_items() {
        let markup = page_with_items(
            r#"{"11":{"id":"11","title":"Alpha","description":"a","firstCreatorName":"Smith","subjects":[]},"22":{"id":"22","title":"Beta","description":"b","subjects":[{"name":"Poetry"}]}}"#,
        );
        let records = extractor().extract_records(&markup).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["11"].title, "Alpha");
        assert_eq!(records["11"].creator_name, "Smith");
        assert_eq!(records["22"].subjects, "Poetry");
        assert_eq!(records["22"].cover_url, "https://stock.example/c.jpg");
    }

    #[test]
    fn test_missing_media_items_is_empty() {
        let records = extractor()
            .extract_records("<html><body>No results</body></html>")
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let markup = page_with_items("{not json");
        let err = extractor().extract_records(&markup).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidJson(_)));
    }

    #[test]
    fn test_malformed_record_aborts_page() {
        let markup = page_with_items(r#"{"1":{"id":"1","title":"No description"}}"#);
        let err = extractor().extract_records(&markup).unwrap_err();
        match err {
            ExtractError::MalformedRecord { raw, .. } => assert!(raw.contains("No description")),
            e => panic!("Expected MalformedRecord, got {:?}", e),
        }
    }

    #[test]
    fn test_relative_next_page_resolved_and_unescaped() {
        let markup = r#"<nav><a class="prev" href="/collection/1?page=1">Previous</a> <span>Next page</span><a href="/collection/1?addedDate=days-0-7&amp;language=en&amp;page=2">2</a></nav>"#;
        let next = extractor().find_next_page_url(markup, PAGE_URL);
        assert_eq!(
            next.as_deref(),
            Some("https://library.example/collection/1?addedDate=days-0-7&language=en&page=2")
        );
    }

    #[test]
    fn test_next_page_without_date_window_ignored() {
        let markup = r#"<span>Next page</span><a href="/collection/1?page=2">2</a>"#;
        assert_eq!(extractor().find_next_page_url(markup, PAGE_URL), None);
    }

    #[test]
    fn test_next_page_must_follow_phrase_on_same_line() {
        let markup = "<a href=\"/collection/1?addedDate=days-0-7&page=2\">2</a>\n<span>Next page</span>";
        assert_eq!(extractor().find_next_page_url(markup, PAGE_URL), None);

        let markup = "<span>Next page</span>\n<a href=\"/collection/1?addedDate=days-0-7&page=2\">2</a>";
        assert_eq!(extractor().find_next_page_url(markup, PAGE_URL), None);
    }

    #[test]
    fn test_absolute_next_page_kept() {
        let markup = r#"Next page <a href="https://other.example/list?addedDate=days-0-7&page=3">"#;
        assert_eq!(
            extractor().find_next_page_url(markup, PAGE_URL).as_deref(),
            Some("https://other.example/list?addedDate=days-0-7&page=3")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let markup = page_with_items(r#"{"1":{"id":"1","title":"T","description":"d"}}"#);
        let page = extractor().extract(PAGE_URL, &markup).unwrap();
        assert_eq!(page.url, PAGE_URL);
        assert_eq!(page.records.len(), 1);
        assert!(page.next_page_url.is_none());
    }

    #[test]
    fn test_custom_marker_is_escaped() {
        let extractor = PageExtractor::with_marker("days-0-14+", "cover150Wide", "x");
        let markup = r#"Next page <a href="/c?addedDate=days-0-14+&page=2">"#;
        assert_eq!(
            extractor.find_next_page_url(markup, "https://l.example/c").as_deref(),
            Some("https://l.example/c?addedDate=days-0-14+&page=2")
        );
    }
}
