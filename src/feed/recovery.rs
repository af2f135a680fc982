use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

use super::entry::{FeedEntry, FeedError};

/// Reads the previously written feed, if any.
///
/// A missing file is a cold start and yields no entries. Anything else that
/// fails to parse is an error: silently starting over would re-announce every
/// item already in the feed.
pub fn recover_entries(path: &Path) -> Result<Vec<FeedEntry>, FeedError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No existing feed, starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(FeedError::Io(e)),
    };

    let entries = parse_feed_document(&content)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "Recovered feed entries");
    Ok(entries)
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Content,
    Published,
    Updated,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"id" => Some(Self::Id),
            b"title" => Some(Self::Title),
            b"content" => Some(Self::Content),
            b"published" => Some(Self::Published),
            b"updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct EntryBuilder {
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    alternate_link: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        slot.get_or_insert(value);
    }

    /// Prefers `rel="alternate"` (or no rel); otherwise the first link seen.
    fn add_link(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<(), FeedError> {
        let decoder = reader.decoder();
        let attr_value = |name: &str| -> Result<Option<String>, FeedError> {
            match e.try_get_attribute(name) {
                Ok(Some(attr)) => attr
                    .decode_and_unescape_value(decoder)
                    .map(|v| Some(v.into_owned()))
                    .map_err(|err| FeedError::XmlParse(err.to_string())),
                Ok(None) => Ok(None),
                Err(err) => Err(FeedError::XmlParse(err.to_string())),
            }
        };

        let Some(href) = attr_value("href")? else {
            return Ok(());
        };
        let rel = attr_value("rel")?;

        match rel.as_deref() {
            None | Some("alternate") => self.alternate_link.get_or_insert(href),
            Some(_) => self.link.get_or_insert(href),
        };
        Ok(())
    }

    fn finish(self, index: usize) -> Result<FeedEntry, FeedError> {
        let missing = |field| FeedError::MissingField { index, field };
        let published = self.published.ok_or_else(|| missing("published"))?;
        let updated = self.updated.ok_or_else(|| missing("updated"))?;

        Ok(FeedEntry {
            id: self.id.ok_or_else(|| missing("id"))?,
            title: self.title.ok_or_else(|| missing("title"))?,
            link: self
                .alternate_link
                .or(self.link)
                .ok_or_else(|| missing("link"))?,
            content: self.content.ok_or_else(|| missing("content"))?,
            published: parse_timestamp(index, "published", published)?,
            updated: parse_timestamp(index, "updated", updated)?,
        })
    }
}

fn parse_timestamp(
    index: usize,
    field: &'static str,
    value: String,
) -> Result<DateTime<FixedOffset>, FeedError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|source| FeedError::InvalidTimestamp {
        index,
        field,
        value,
        source,
    })
}

/// Parses an Atom document into its entries, in document order.
///
/// Only direct children of `<entry>` are read. Text is not trimmed, so
/// content survives a write/read cycle unchanged.
pub fn parse_feed_document(content: &str) -> Result<Vec<FeedEntry>, FeedError> {
    // quick-xml (0.37) never expands <!ENTITY> declarations; only
    // the five predefined entities are resolved by unescape().
    let mut reader = Reader::from_str(content);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut saw_root = false;
    let mut root_closed = false;
    // Open elements outside any <entry>, the root included.
    let mut feed_depth: usize = 0;
    let mut current: Option<EntryBuilder> = None;
    // Element depth below the open <entry>; 0 means directly inside it.
    let mut depth: usize = 0;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if !saw_root {
                    if name.as_ref() != b"feed" {
                        return Err(FeedError::NotAtom);
                    }
                    saw_root = true;
                    feed_depth = 1;
                } else if let Some(builder) = current.as_mut() {
                    if depth == 0 {
                        if name.as_ref() == b"link" {
                            builder.add_link(&e, &reader)?;
                        } else {
                            field = Field::from_name(name.as_ref());
                            text.clear();
                        }
                    }
                    depth += 1;
                } else if name.as_ref() == b"entry" {
                    current = Some(EntryBuilder::default());
                    depth = 0;
                } else {
                    feed_depth += 1;
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if !saw_root {
                    if name.as_ref() != b"feed" {
                        return Err(FeedError::NotAtom);
                    }
                    saw_root = true;
                    root_closed = true;
                } else if let Some(builder) = current.as_mut() {
                    if depth == 0 {
                        if name.as_ref() == b"link" {
                            builder.add_link(&e, &reader)?;
                        } else if let Some(f) = Field::from_name(name.as_ref()) {
                            builder.set(f, String::new());
                        }
                    }
                }
            }
            Ok(Event::End(_)) if current.is_some() => {
                if depth == 0 {
                    if let Some(done) = current.take() {
                        entries.push(done.finish(entries.len())?);
                    }
                } else {
                    depth -= 1;
                    if depth == 0 {
                        if let (Some(f), Some(builder)) = (field.take(), current.as_mut()) {
                            builder.set(f, std::mem::take(&mut text));
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                feed_depth = feed_depth.saturating_sub(1);
                if feed_depth == 0 {
                    root_closed = true;
                }
            }
            Ok(Event::Text(t)) if field.is_some() && depth == 1 => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| FeedError::XmlParse(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(c)) if field.is_some() && depth == 1 => {
                let raw = std::str::from_utf8(&c).map_err(|e| FeedError::XmlParse(e.to_string()))?;
                text.push_str(raw);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(FeedError::NotAtom);
    }
    if current.is_some() {
        return Err(FeedError::XmlParse("document ends inside an <entry>".to_string()));
    }
    if !root_closed {
        return Err(FeedError::XmlParse("document ends before </feed>".to_string()));
    }

    Ok(entries)
}
