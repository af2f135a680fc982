use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use url::Url;

use super::entry::FeedEntry;
use crate::catalogue::CatalogueRecord;
use crate::config::Config;

/// Turns newly discovered records into feed entries.
pub struct EntryRenderer<'a> {
    config: &'a Config,
}

impl<'a> EntryRenderer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Renders `records` sorted by creator, then title, then id.
    ///
    /// Every entry gets `now` as both published and updated timestamp.
    pub fn render_all(&self, mut records: Vec<CatalogueRecord>, now: DateTime<Utc>) -> Vec<FeedEntry> {
        records.sort_by(|a, b| {
            a.creator_name
                .cmp(&b.creator_name)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        records.iter().map(|record| self.render(record, now)).collect()
    }

    pub fn render(&self, record: &CatalogueRecord, now: DateTime<Utc>) -> FeedEntry {
        let link = self.config.media_url(&record.id);
        FeedEntry {
            id: record.id.clone(),
            title: format!(
                "{} by {} is in the {}",
                record.title, record.creator_name, self.config.library_name
            ),
            content: self.content(record, &link),
            link,
            published: now.into(),
            updated: now.into(),
        }
    }

    fn content(&self, record: &CatalogueRecord, link: &str) -> String {
        let subtitle = record
            .subtitle
            .as_deref()
            .map(|s| format!("<h3>{}</h3>", encode_text(s)))
            .unwrap_or_default();

        let mut html = format!(
            "\n<a href=\"{link}\">\n<img src=\"{cover}\">\n<h2>{title}</h2>\n{subtitle}\n</a>\n\
             is an ebook and is available at the {library}.\n\
             <p>Subjects: {subjects}</p>\n\
             <blockquote>\n{description}\n</blockquote>\n",
            link = encode_double_quoted_attribute(link),
            cover = encode_double_quoted_attribute(&record.cover_url),
            title = encode_text(&record.title),
            library = encode_text(&self.config.library_name),
            subjects = encode_text(&record.subjects),
            // Descriptions are already HTML.
            description = record.description,
        );

        if let Some(search) = self.goodreads_link(&record.title) {
            html.push_str(&format!(
                "<p>Look it up <a href=\"{}\">on Goodreads</a>.</p>\n",
                encode_double_quoted_attribute(&search)
            ));
        }
        html
    }

    fn goodreads_link(&self, title: &str) -> Option<String> {
        match Url::parse_with_params(&self.config.goodreads_search_url, &[("q", title)]) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!(
                    base = %self.config.goodreads_search_url,
                    error = %e,
                    "Invalid Goodreads search URL, omitting lookup link"
                );
                None
            }
        }
    }
}
