//! One complete run: walk the catalogue, reconcile with the persisted feed,
//! and write the feed back when something new turned up.
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalogue::{collect_records, CatalogueError, CatalogueRecord, PageExtractor, PageSource};
use crate::config::Config;
use crate::feed::{
    novel_records, recover_entries, retention_cutoff, trim_expired, write_feed, EntryRenderer,
    FeedEntry, FeedError, FeedMetadata,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error("Persisted feed is unusable: {0}")]
    Feed(#[from] FeedError),
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The catalogue listed no records at all. The feed was not read.
    NothingListed,
    /// Every listed record is already in the feed. Nothing was written.
    AllSeen { listed: usize },
    Updated(FeedUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    pub added: usize,
    pub expired: usize,
    /// Entries in the feed after the update.
    pub total: usize,
    /// False for a dry run.
    pub written: bool,
}

/// The feed as it should be persisted after reconciliation.
#[derive(Debug)]
pub struct FeedPlan {
    /// Surviving recovered entries followed by the new ones.
    pub entries: Vec<FeedEntry>,
    pub added: usize,
    pub expired: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Do everything except writing the feed file.
    pub dry_run: bool,
}

/// Reconciles discovered records with recovered entries.
///
/// Returns `None` when no discovered id is new, in which case the feed must
/// be left untouched. Otherwise expired entries are trimmed and the new
/// entries appended, all stamped with `now`.
pub fn plan_update(
    config: &Config,
    discovered: BTreeMap<String, CatalogueRecord>,
    mut recovered: Vec<FeedEntry>,
    now: DateTime<Utc>,
) -> Option<FeedPlan> {
    let novel = novel_records(discovered, &recovered);
    if novel.is_empty() {
        return None;
    }

    let cutoff = retention_cutoff(now, config.retention_window());
    let expired = trim_expired(&mut recovered, cutoff, config.retention_mode);

    let added = EntryRenderer::new(config).render_all(novel, now);
    for entry in &added {
        tracing::info!(id = %entry.id, title = %entry.title, "New catalogue entry");
    }

    let added_count = added.len();
    recovered.extend(added);
    Some(FeedPlan {
        entries: recovered,
        added: added_count,
        expired,
    })
}

/// Runs one full discovery and feed update.
///
/// Nothing is written unless the whole traversal succeeded and at least one
/// record is new; any error leaves the existing feed file as it was.
pub async fn sync_feed<S: PageSource>(
    config: &Config,
    source: &S,
    now: DateTime<Utc>,
    options: SyncOptions,
) -> Result<SyncOutcome, SyncError> {
    let extractor = PageExtractor::new(config);
    let traversal = collect_records(source, &extractor, &config.seed_url, config.max_pages).await?;

    if traversal.records.is_empty() {
        tracing::info!(pages = traversal.visited.len(), "No new items in the catalogue");
        return Ok(SyncOutcome::NothingListed);
    }

    let listed = traversal.records.len();
    let recovered = recover_entries(&config.feed_path)?;

    let Some(plan) = plan_update(config, traversal.records, recovered, now) else {
        tracing::info!(listed, "All listed items have been seen already");
        return Ok(SyncOutcome::AllSeen { listed });
    };

    if options.dry_run {
        tracing::info!(added = plan.added, expired = plan.expired, "Dry run, feed not written");
    } else {
        write_feed(&config.feed_path, &FeedMetadata::from(config), &plan.entries, now)?;
    }

    Ok(SyncOutcome::Updated(FeedUpdate {
        added: plan.added,
        expired: plan.expired,
        total: plan.entries.len(),
        written: !options.dry_run,
    }))
}
