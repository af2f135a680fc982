use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

use super::entry::{FeedEntry, FeedError, FeedMetadata};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

fn xml_err(e: impl std::fmt::Display) -> FeedError {
    FeedError::Write(e.to_string())
}

/// Writes `<name>text</name>`.
fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), FeedError> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))
        .map_err(xml_err)?;
    Ok(())
}

/// Renders the whole feed as an Atom 1.0 document.
///
/// Entries are written in the order given. `updated` becomes the feed-level
/// `<updated>` timestamp.
pub fn render_document(
    metadata: &FeedMetadata,
    entries: &[FeedEntry],
    updated: DateTime<Utc>,
) -> Result<String, FeedError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(feed)).map_err(xml_err)?;

    write_text_element(&mut writer, "id", &metadata.id)?;
    write_text_element(&mut writer, "title", &metadata.title)?;
    write_text_element(&mut writer, "updated", &updated.to_rfc3339())?;

    writer
        .write_event(Event::Start(BytesStart::new("author")))
        .map_err(xml_err)?;
    write_text_element(&mut writer, "name", &metadata.author_name)?;
    if let Some(email) = &metadata.author_email {
        write_text_element(&mut writer, "email", email)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("author")))
        .map_err(xml_err)?;

    writer
        .create_element("generator")
        .with_attribute(("version", env!("CARGO_PKG_VERSION")))
        .write_text_content(BytesText::new(env!("CARGO_PKG_NAME")))
        .map_err(xml_err)?;

    for entry in entries {
        write_entry(&mut writer, entry)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("feed")))
        .map_err(xml_err)?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(xml_err)
}

fn write_entry<W: std::io::Write>(
    writer: &mut Writer<W>,
    entry: &FeedEntry,
) -> Result<(), FeedError> {
    writer
        .write_event(Event::Start(BytesStart::new("entry")))
        .map_err(xml_err)?;

    write_text_element(writer, "id", &entry.id)?;
    write_text_element(writer, "title", &entry.title)?;
    write_text_element(writer, "updated", &entry.updated.to_rfc3339())?;
    writer
        .create_element("link")
        .with_attribute(("href", entry.link.as_str()))
        .write_empty()
        .map_err(xml_err)?;
    writer
        .create_element("content")
        .with_attribute(("type", "html"))
        .write_text_content(BytesText::new(&entry.content))
        .map_err(xml_err)?;
    write_text_element(writer, "published", &entry.published.to_rfc3339())?;

    writer
        .write_event(Event::End(BytesEnd::new("entry")))
        .map_err(xml_err)?;
    Ok(())
}

/// Writes the feed to `path` atomically.
///
/// The document goes to a temporary sibling file which is synced and then
/// renamed over `path`, so a failed run never leaves a partial feed behind.
pub fn write_feed(
    path: &Path,
    metadata: &FeedMetadata,
    entries: &[FeedEntry],
    updated: DateTime<Utc>,
) -> Result<(), FeedError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let content = render_document(metadata, entries, updated)?;

    // Nanosecond suffix keeps concurrent writers off each other's temp file;
    // create_new refuses to reuse an existing one.
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| {
            FeedError::Write(format!(
                "Failed to create temporary file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;

    if let Err(e) = std::io::Write::write_all(&mut file, content.as_bytes()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(FeedError::Write(format!(
            "Failed to write feed to temporary file '{}': {}",
            temp_path.display(),
            e
        )));
    }

    if let Err(e) = file.sync_all() {
        let _ = std::fs::remove_file(&temp_path);
        return Err(FeedError::Write(format!(
            "Failed to sync temporary file '{}' to disk: {}",
            temp_path.display(),
            e
        )));
    }

    drop(file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(FeedError::Write(format!(
                "Failed to remove existing '{}' before atomic replace: {}",
                path.display(),
                e
            )));
        }
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(FeedError::Write(format!(
            "Failed to rename '{}' to '{}': {}",
            temp_path.display(),
            path.display(),
            e
        )));
    }

    tracing::info!(path = %path.display(), entries = entries.len(), "Wrote feed");
    Ok(())
}
