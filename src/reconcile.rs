//! Index reconciliation.
//!
//! Both passes are pure: they take the feed items and the prior index by
//! reference or value and hand back a new index plus what happened to each
//! item. Reading and writing the store is the caller's job.
use std::collections::HashMap;
use tracing::{info, warn};

use crate::builder::{build_episode, SkipReason};
use crate::feed::FeedItem;
use crate::matcher::find_existing;
use crate::model::{now_iso, Episode, EpisodeStatus, EpisodesIndex};
use crate::numbering::NumberingPolicy;

/// A feed item that was dropped from the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemWarning {
    /// Zero-based position of the item in the feed.
    pub position: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub index: EpisodesIndex,
    /// Episodes written into `index` by this pass.
    pub added: usize,
    /// Of `added`, how many carried curated fields over from the prior index.
    pub preserved: usize,
    /// Items recognized as episodes already in the index.
    pub skipped_existing: usize,
    pub warnings: Vec<ItemWarning>,
}

impl Reconciliation {
    fn start(index: EpisodesIndex) -> Self {
        Self {
            index,
            added: 0,
            preserved: 0,
            skipped_existing: 0,
            warnings: Vec::new(),
        }
    }

    fn skip(mut self, position: usize, reason: SkipReason) -> Self {
        warn!(position, %reason, "skipping feed item");
        self.warnings.push(ItemWarning { position, reason });
        self
    }

    fn already_present(mut self, candidate: &Episode, existing_number: u32) -> Self {
        info!(
            number = candidate.episode_number,
            existing_number, "episode already exists, skipping"
        );
        self.skipped_existing += 1;
        self
    }

    fn insert(mut self, episode: Episode) -> Self {
        self.index = upsert_episode(self.index, episode);
        self.added += 1;
        self
    }
}

/// Replace the episode with the same id or number in place, or append it.
/// `lastUpdated` is refreshed either way.
pub fn upsert_episode(index: EpisodesIndex, episode: Episode) -> EpisodesIndex {
    let mut episodes = index.episodes;
    match episodes.iter().position(|e| {
        e.episode_id == episode.episode_id || e.episode_number == episode.episode_number
    }) {
        Some(pos) => episodes[pos] = episode,
        None => episodes.push(episode),
    }
    EpisodesIndex {
        episodes,
        last_updated: now_iso(),
    }
}

/// Additive pass: only episodes the index has never seen are added.
pub fn reconcile_additive(
    index: EpisodesIndex,
    items: &[FeedItem],
    policy: &NumberingPolicy,
) -> Reconciliation {
    items
        .iter()
        .enumerate()
        .fold(Reconciliation::start(index), |acc, (position, item)| {
            let candidate = match build_episode(item, &acc.index, policy) {
                Ok(ep) => ep,
                Err(reason) => return acc.skip(position, reason),
            };
            if let Some((_, existing)) = find_existing(&candidate, &acc.index) {
                let existing_number = existing.episode_number;
                return acc.already_present(&candidate, existing_number);
            }
            info!(
                number = candidate.episode_number,
                title = %candidate.title,
                "added new episode"
            );
            acc.insert(candidate)
        })
}

/// Rebuild pass: the index is rebuilt from the feed alone, while curated
/// fields are carried over from `previous` by episode number.
pub fn reconcile_rebuild(
    previous: &EpisodesIndex,
    items: &[FeedItem],
    policy: &NumberingPolicy,
) -> Reconciliation {
    let preserved: HashMap<u32, &Episode> = previous
        .episodes
        .iter()
        .map(|e| (e.episode_number, e))
        .collect();

    items
        .iter()
        .enumerate()
        .fold(Reconciliation::start(EpisodesIndex::empty()), |acc, (position, item)| {
            let candidate = match build_episode(item, &acc.index, policy) {
                Ok(ep) => ep,
                Err(reason) => return acc.skip(position, reason),
            };
            if let Some((_, existing)) = find_existing(&candidate, &acc.index) {
                let existing_number = existing.episode_number;
                return acc.already_present(&candidate, existing_number);
            }
            match preserved.get(&candidate.episode_number) {
                Some(old) => {
                    info!(
                        number = candidate.episode_number,
                        kept_shownotes = !old.shownotes.is_empty(),
                        "reprocessed episode"
                    );
                    let merged = merge_preserved(old, candidate);
                    let mut acc = acc.insert(merged);
                    acc.preserved += 1;
                    acc
                }
                None => {
                    info!(
                        number = candidate.episode_number,
                        title = %candidate.title,
                        "added new episode"
                    );
                    acc.insert(candidate)
                }
            }
        })
}

/// Feed-derived fields from `fresh`, curated fields and identity from `old`.
pub fn merge_preserved(old: &Episode, fresh: Episode) -> Episode {
    let shownotes = if old.shownotes.is_empty() {
        fresh.shownotes
    } else {
        old.shownotes.clone()
    };
    let translations = if old.translations.is_empty() {
        fresh.translations
    } else {
        old.translations.clone()
    };
    Episode {
        episode_id: old.episode_id.clone(),
        shownotes,
        translations,
        status: merge_status(old.status, fresh.status),
        ..fresh
    }
}

/// A draft stays draft; a promoted episode never drops back to draft but
/// takes any other status the feed reports.
pub fn merge_status(old: EpisodeStatus, fresh: EpisodeStatus) -> EpisodeStatus {
    match (old, fresh) {
        (EpisodeStatus::Draft, _) => EpisodeStatus::Draft,
        (old, EpisodeStatus::Draft) => old,
        (_, fresh) => fresh,
    }
}
