use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Creator shown when a record carries no `firstCreatorName`.
pub const UNKNOWN_CREATOR: &str = "Unknown Creator";

/// Errors raised while turning embedded page data into records.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The `mediaItems` block was found but is not a JSON object.
    #[error("Embedded media items are not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A record lacks a required attribute or has the wrong shape.
    #[error("Unable to parse catalogue record ({reason}). Record is\n{raw}")]
    MalformedRecord { reason: String, raw: String },
}

/// One catalogue item, as embedded in a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueRecord {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub creator_name: String,
    pub cover_url: String,
    pub description: String,
    /// Subject names, sorted and joined with ", ".
    pub subjects: String,
}

/// Attributes of a record exactly as they appear in the page, every field
/// optional so missing-key handling happens in one place.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub first_creator_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub subjects: Option<Vec<RawSubject>>,
    #[serde(default)]
    pub covers: Option<BTreeMap<String, RawCover>>,
}

#[derive(Debug, Deserialize)]
pub struct RawSubject {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawCover {
    pub href: Option<String>,
}

/// Cover selection policy for records.
#[derive(Debug, Clone, Copy)]
pub struct CoverPreference<'a> {
    pub preferred_key: &'a str,
    pub fallback_url: &'a str,
}

impl CatalogueRecord {
    /// Builds a record from one raw attribute mapping.
    ///
    /// Fails with [`ExtractError::MalformedRecord`] when `id`, `title` or
    /// `description` is missing. The error carries the pretty-printed mapping.
    pub fn from_value(value: Value, covers: CoverPreference<'_>) -> Result<Self, ExtractError> {
        let raw_text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        let malformed = |reason: String| ExtractError::MalformedRecord {
            reason,
            raw: raw_text.clone(),
        };

        let raw: RawRecord =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        let id = match raw.id {
            Some(Value::String(ref s)) if s.is_empty() => return Err(malformed("empty id".into())),
            Some(Value::String(ref s)) => xml_safe(s),
            Some(Value::Number(ref n)) => n.to_string(),
            Some(_) => return Err(malformed("id is not a string".into())),
            None => return Err(malformed("missing id".into())),
        };
        let title = raw
            .title
            .as_deref()
            .map(xml_safe)
            .ok_or_else(|| malformed("missing title".into()))?;
        let description = raw
            .description
            .as_deref()
            .map(xml_safe)
            .ok_or_else(|| malformed("missing description".into()))?;

        let cover_url = select_cover(&raw, covers).unwrap_or_else(|| {
            tracing::warn!(
                id = %id,
                record = %raw_text,
                "Unable to get cover from record, using stock image"
            );
            covers.fallback_url.to_string()
        });

        let mut subject_names: Vec<String> = raw
            .subjects
            .unwrap_or_default()
            .into_iter()
            .map(|s| xml_safe(&s.name))
            .collect();
        subject_names.sort();

        Ok(Self {
            id,
            title,
            subtitle: raw
                .subtitle
                .as_deref()
                .map(xml_safe)
                .filter(|s| !s.trim().is_empty()),
            creator_name: raw
                .first_creator_name
                .as_deref()
                .map(xml_safe)
                .unwrap_or_else(|| UNKNOWN_CREATOR.to_string()),
            cover_url: xml_safe(&cover_url),
            description,
            subjects: subject_names.join(", "),
        })
    }
}

/// Drops characters XML 1.0 cannot carry (C0 controls other than tab, LF
/// and CR, plus U+FFFE and U+FFFF) so catalogue text is safe to publish.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
        })
        .collect()
}

/// Picks the preferred cover, else the first cover by key order.
///
/// Returns `None` when the record has no usable cover.
fn select_cover(raw: &RawRecord, preference: CoverPreference<'_>) -> Option<String> {
    let covers = raw.covers.as_ref()?;

    if let Some(href) = covers
        .get(preference.preferred_key)
        .and_then(|c| c.href.as_deref())
    {
        return Some(href.to_string());
    }

    covers.values().find_map(|c| c.href.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PREFERENCE: CoverPreference<'static> = CoverPreference {
        preferred_key: "cover150Wide",
        fallback_url: "https://stock.example/cover.jpg",
    };

    fn full_record() -> Value {
        json!({
            "id": "123",
            "title": "The Hobbit",
            "subtitle": "There and Back Again",
            "firstCreatorName": "J. R. R. Tolkien",
            "description": "<p>A hobbit goes on an adventure.</p>",
            "subjects": [{"id": "2", "name": "Fantasy"}, {"id": "1", "name": "Classics"}],
            "covers": {
                "cover300Wide": {"href": "https://img.example/300.jpg"},
                "cover150Wide": {"href": "https://img.example/150.jpg"},
            }
        })
    }

    #[test]
    fn test_full_record() {
        let record = CatalogueRecord::from_value(full_record(), PREFERENCE).unwrap();
        assert_eq!(record.id, "123");
        assert_eq!(record.title, "The Hobbit");
        assert_eq!(record.subtitle.as_deref(), Some("There and Back Again"));
        assert_eq!(record.creator_name, "J. R. R. Tolkien");
        assert_eq!(record.cover_url, "https://img.example/150.jpg");
        assert_eq!(record.subjects, "Classics, Fantasy");
    }

    #[test]
    fn test_missing_creator_uses_sentinel() {
        let mut value = full_record();
        value.as_object_mut().unwrap().remove("firstCreatorName");
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert_eq!(record.creator_name, UNKNOWN_CREATOR);
    }

    #[test]
    fn test_null_and_empty_subtitle_are_absent() {
        let mut value = full_record();
        value["subtitle"] = Value::Null;
        let record = CatalogueRecord::from_value(value.clone(), PREFERENCE).unwrap();
        assert!(record.subtitle.is_none());

        value["subtitle"] = json!("");
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert!(record.subtitle.is_none());
    }

    #[test]
    fn test_no_subjects_yields_empty_string() {
        let mut value = full_record();
        value.as_object_mut().unwrap().remove("subjects");
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert_eq!(record.subjects, "");
    }

    #[test]
    fn test_numeric_id_accepted() {
        let mut value = full_record();
        value["id"] = json!(4567);
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert_eq!(record.id, "4567");
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        for field in ["id", "title", "description"] {
            let mut value = full_record();
            value.as_object_mut().unwrap().remove(field);
            let err = CatalogueRecord::from_value(value, PREFERENCE).unwrap_err();
            match err {
                ExtractError::MalformedRecord { reason, raw } => {
                    assert!(reason.contains(field), "reason {reason:?} should name {field}");
                    assert!(raw.contains("The Hobbit") || raw.contains("123"));
                }
                e => panic!("Expected MalformedRecord, got {:?}", e),
            }
        }
    }

    #[test]
    fn test_empty_id_is_malformed() {
        let mut value = full_record();
        value["id"] = json!("");
        match CatalogueRecord::from_value(value, PREFERENCE).unwrap_err() {
            ExtractError::MalformedRecord { reason, .. } => assert_eq!(reason, "empty id"),
            e => panic!("Expected MalformedRecord, got {:?}", e),
        }
    }

    #[test]
    fn test_control_characters_stripped() {
        let mut value = full_record();
        value["title"] = json!("Bad\u{8}Title");
        value["subtitle"] = json!("Line\u{b}Feed");
        value["firstCreatorName"] = json!("A\u{0}uthor");
        value["description"] = json!("<p>Tab\tand\nnewline\u{1f}</p>");
        value["subjects"] = json!([{"name": "Fic\u{7}tion"}]);
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert_eq!(record.title, "BadTitle");
        assert_eq!(record.subtitle.as_deref(), Some("LineFeed"));
        assert_eq!(record.creator_name, "Author");
        assert_eq!(record.description, "<p>Tab\tand\nnewline</p>");
        assert_eq!(record.subjects, "Fiction");
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = CatalogueRecord::from_value(json!("just a string"), PREFERENCE).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRecord { .. }));
    }

    #[test]
    fn test_cover_falls_back_to_first_key_in_order() {
        let mut value = full_record();
        value["covers"] = json!({
            "cover510Wide": {"href": "https://img.example/510.jpg"},
            "cover300Wide": {"href": "https://img.example/300.jpg"},
        });
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert_eq!(record.cover_url, "https://img.example/300.jpg");
    }

    #[test]
    fn test_missing_or_empty_covers_use_stock_image() {
        let mut value = full_record();
        value.as_object_mut().unwrap().remove("covers");
        let record = CatalogueRecord::from_value(value.clone(), PREFERENCE).unwrap();
        assert_eq!(record.cover_url, PREFERENCE.fallback_url);

        value["covers"] = json!({});
        let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
        assert_eq!(record.cover_url, PREFERENCE.fallback_url);
    }

    proptest::proptest! {
        #[test]
        fn prop_preferred_cover_always_wins(
            others in proptest::collection::btree_map("cover[0-9]{1,3}[A-Za-z]{0,4}", "[a-z]{1,8}", 0..6)
        ) {
            let mut covers = serde_json::Map::new();
            for (key, name) in &others {
                covers.insert(key.clone(), json!({"href": format!("https://img.example/{name}.jpg")}));
            }
            covers.insert("cover150Wide".into(), json!({"href": "https://img.example/preferred.jpg"}));

            let mut value = full_record();
            value["covers"] = Value::Object(covers);
            let record = CatalogueRecord::from_value(value, PREFERENCE).unwrap();
            proptest::prop_assert_eq!(record.cover_url, "https://img.example/preferred.jpg");
        }
    }
}
