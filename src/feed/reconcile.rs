use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};

use super::entry::FeedEntry;
use crate::catalogue::CatalogueRecord;
use crate::config::RetentionMode;

/// Records whose id does not appear among the recovered entries.
///
/// Identity is the record id only; a record whose content changed upstream
/// is still considered seen.
pub fn novel_records(
    discovered: BTreeMap<String, CatalogueRecord>,
    recovered: &[FeedEntry],
) -> Vec<CatalogueRecord> {
    let seen: HashSet<&str> = recovered.iter().map(|e| e.id.as_str()).collect();
    discovered
        .into_values()
        .filter(|record| !seen.contains(record.id.as_str()))
        .collect()
}

/// Oldest published timestamp an entry may have and still be kept.
///
/// A window reaching past the earliest representable time keeps everything.
pub fn retention_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Removes expired entries in place and returns how many were dropped.
///
/// [`RetentionMode::BoundaryScan`] relies on entries being appended in
/// chronological order: everything positioned before the first entry inside
/// the window goes. An out-of-order stale entry positioned after that
/// boundary survives until a later run. [`RetentionMode::Timestamp`] checks
/// every entry individually.
pub fn trim_expired(entries: &mut Vec<FeedEntry>, cutoff: DateTime<Utc>, mode: RetentionMode) -> usize {
    let before = entries.len();
    let is_current = |entry: &FeedEntry| entry.published.with_timezone(&Utc) >= cutoff;

    match mode {
        RetentionMode::BoundaryScan => {
            let boundary = entries.iter().position(is_current).unwrap_or(entries.len());
            entries.drain(..boundary);
        }
        RetentionMode::Timestamp => entries.retain(is_current),
    }

    before - entries.len()
}
