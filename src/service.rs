//! Operations exposed to the trigger surface: scheduled/manual sync,
//! reprocess, reset, inspection and manual single-episode updates.
//!
//! Each operation is one read-modify-write of the index document. At most
//! one operation is expected to run at a time; nothing here locks.
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::builder::validate_episode;
use crate::db::KvStore;
use crate::error::{Result, SyncError};
use crate::extract::DEFAULT_DURATION;
use crate::feed::{parse_feed, FeedItem, FeedSource};
use crate::model::{
    now_iso, parse_instant, to_iso, Episode, EpisodeStatus, EpisodesIndex, IndexSummary,
    Translation,
};
use crate::numbering::NumberingPolicy;
use crate::reconcile::{reconcile_additive, reconcile_rebuild, upsert_episode, ItemWarning, Reconciliation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    Additive,
    Rebuild,
}

impl fmt::Display for PassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassMode::Additive => f.write_str("additive"),
            PassMode::Rebuild => f.write_str("rebuild"),
        }
    }
}

/// Outcome of a pass that did not fail.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub mode: PassMode,
    pub feed_items: usize,
    pub added: usize,
    pub preserved: usize,
    pub skipped_existing: usize,
    pub warnings: Vec<ItemWarning>,
    /// Whether the index document was written.
    pub persisted: bool,
    pub total_episodes: usize,
}

impl PassReport {
    fn new(mode: PassMode, feed_items: usize, result: &Reconciliation, persisted: bool) -> Self {
        Self {
            mode,
            feed_items,
            added: result.added,
            preserved: result.preserved,
            skipped_existing: result.skipped_existing,
            warnings: result.warnings.clone(),
            persisted,
            total_episodes: result.index.episodes.len(),
        }
    }
}

/// A manually edited episode as submitted by the admin surface. Loosely
/// typed so that bad input produces validation messages, not parse errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeUpdate {
    #[serde(deserialize_with = "loose_string")]
    pub episode_id: String,
    /// Form fields arrive as strings; parsed like `parseInt`, 0 when unusable.
    #[serde(deserialize_with = "loose_int")]
    pub episode_number: i64,
    #[serde(deserialize_with = "loose_string")]
    pub title: String,
    #[serde(deserialize_with = "loose_string")]
    pub publish_date: String,
    #[serde(deserialize_with = "loose_string")]
    pub duration: String,
    #[serde(deserialize_with = "loose_string")]
    pub description: String,
    #[serde(deserialize_with = "loose_string")]
    pub audio_url: String,
    #[serde(deserialize_with = "loose_string")]
    pub shownotes: String,
    #[serde(deserialize_with = "null_as_default")]
    pub translations: Vec<Translation>,
    #[serde(deserialize_with = "null_as_default")]
    pub google_docs_urls: Vec<String>,
    #[serde(deserialize_with = "loose_string")]
    pub status: String,
}

/// `null` is empty; numbers and booleans keep their JSON text.
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn loose_int<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_int(&s).unwrap_or(0),
        _ => 0,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional sign and leading digits of `raw`; trailing junk is ignored.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.as_bytes().first() {
        Some(b'-') => (-1, &raw[1..]),
        Some(b'+') => (1, &raw[1..]),
        _ => (1, raw),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

impl EpisodeUpdate {
    /// Validate and convert into a stored episode. Errors are human-readable.
    pub fn into_episode(self) -> std::result::Result<Episode, Vec<String>> {
        let mut errors = Vec::new();
        if self.episode_id.trim().is_empty() {
            errors.push("Episode ID is required".to_string());
        }
        let status = if self.status.trim().is_empty() {
            Some(EpisodeStatus::Draft)
        } else {
            EpisodeStatus::parse_status(self.status.trim())
        };
        let episode_number = u32::try_from(self.episode_number).ok();

        let episode = Episode {
            episode_id: self.episode_id.trim().to_string(),
            episode_number: episode_number.unwrap_or(0),
            title: self.title.trim().to_string(),
            publish_date: parse_instant(&self.publish_date)
                .map(to_iso)
                .unwrap_or_else(|| self.publish_date.trim().to_string()),
            duration: if self.duration.trim().is_empty() {
                DEFAULT_DURATION.to_string()
            } else {
                self.duration.trim().to_string()
            },
            description: self.description,
            audio_url: self.audio_url.trim().to_string(),
            shownotes: self.shownotes,
            translations: self.translations,
            google_docs_urls: self.google_docs_urls,
            status: status.unwrap_or_default(),
        };

        errors.extend(validate_episode(&episode, 1));
        if episode_number.is_none() && !errors.iter().any(|e| e.starts_with("Valid episode number")) {
            errors.push("Valid episode number is required".to_string());
        }
        if status.is_none() {
            errors.push("Invalid status".to_string());
        }

        if errors.is_empty() {
            Ok(episode)
        } else {
            Err(errors)
        }
    }
}

pub struct IndexService {
    store: Arc<dyn KvStore>,
    feed: Arc<dyn FeedSource>,
    policy: NumberingPolicy,
    index_key: String,
}

impl fmt::Debug for IndexService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexService")
            .field("policy", &self.policy)
            .field("index_key", &self.index_key)
            .finish_non_exhaustive()
    }
}

impl IndexService {
    pub fn new(
        store: Arc<dyn KvStore>,
        feed: Arc<dyn FeedSource>,
        policy: NumberingPolicy,
        index_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            feed,
            policy,
            index_key: index_key.into(),
        }
    }

    pub fn policy(&self) -> &NumberingPolicy {
        &self.policy
    }

    /// The stored index, or `None` when nothing usable is stored. A document
    /// that does not parse is logged and treated as absent.
    pub async fn load_index(&self) -> Result<Option<EpisodesIndex>> {
        let raw = self
            .store
            .get(&self.index_key)
            .await
            .map_err(SyncError::Store)?;
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(None);
        };
        match serde_json::from_str::<EpisodesIndex>(&raw) {
            Ok(index) => Ok(Some(index)),
            Err(err) => {
                warn!(?err, key = %self.index_key, "stored index is corrupt, starting fresh");
                Ok(None)
            }
        }
    }

    async fn save_index(&self, index: &EpisodesIndex) -> Result<()> {
        let body = serde_json::to_string(index)?;
        self.store
            .put(&self.index_key, &body)
            .await
            .map_err(SyncError::Store)?;
        info!(episodes = index.episodes.len(), "episodes index saved");
        Ok(())
    }

    async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
        let text = self.feed.fetch().await?;
        let items = parse_feed(&text)?;
        info!(items = items.len(), "feed parsed");
        if let Some(first) = items.first() {
            debug!(item = ?first, "first feed item");
        }
        Ok(items)
    }

    /// One additive pass. Writes only when something new was added.
    #[instrument(skip_all, fields(policy = self.policy.name()))]
    pub async fn run_ingestion(&self) -> Result<PassReport> {
        info!("starting feed ingestion");
        let items = self.fetch_items().await?;
        let index = match self.load_index().await? {
            Some(index) => {
                info!(episodes = index.episodes.len(), "loaded existing index");
                index
            }
            None => {
                info!("no existing index, starting empty");
                EpisodesIndex::empty()
            }
        };

        let mut result = reconcile_additive(index, &items, &self.policy);
        let persisted = result.added > 0;
        if persisted {
            result.index.last_updated = now_iso();
            self.save_index(&result.index).await?;
            info!(added = result.added, "index updated with new episodes");
        } else {
            info!("no new episodes found");
        }
        Ok(PassReport::new(PassMode::Additive, items.len(), &result, persisted))
    }

    /// Rebuild the index from the feed, carrying curated fields over from
    /// the stored index. Always writes.
    #[instrument(skip_all, fields(policy = self.policy.name()))]
    pub async fn run_reprocess(&self) -> Result<PassReport> {
        info!("starting reprocess with preservation");
        let previous = self.load_index().await?.unwrap_or_else(EpisodesIndex::empty);
        info!(
            episodes = previous.episodes.len(),
            "loaded episodes for preservation"
        );
        let items = self.fetch_items().await?;

        let mut result = reconcile_rebuild(&previous, &items, &self.policy);
        result.index.last_updated = now_iso();
        self.save_index(&result.index).await?;
        info!(
            processed = result.added,
            preserved = result.preserved,
            "reprocess completed"
        );
        Ok(PassReport::new(PassMode::Rebuild, items.len(), &result, true))
    }

    /// Replace the stored index with an empty one.
    pub async fn reset_index(&self) -> Result<()> {
        self.save_index(&EpisodesIndex::empty()).await?;
        info!("episodes index cleared");
        Ok(())
    }

    /// Read-only summary of the stored index.
    pub async fn inspect_index(&self) -> Result<IndexSummary> {
        Ok(match self.load_index().await? {
            Some(index) => index.summary(),
            None => IndexSummary {
                total_episodes: 0,
                last_updated: None,
                episodes: Vec::new(),
            },
        })
    }

    /// Validate a manual edit and upsert it by id or episode number.
    #[instrument(skip_all)]
    pub async fn update_episode(&self, update: EpisodeUpdate) -> Result<Episode> {
        let episode = update.into_episode().map_err(SyncError::Invalid)?;
        let index = self.load_index().await?.unwrap_or_else(EpisodesIndex::empty);
        let index = upsert_episode(index, episode.clone());
        self.save_index(&index).await?;
        info!(
            number = episode.episode_number,
            status = episode.status.as_str(),
            "episode updated"
        );
        Ok(episode)
    }
}
