use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    #[default]
    Draft,
    PendingPublish,
    Published,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Draft => "draft",
            EpisodeStatus::PendingPublish => "pending_publish",
            EpisodeStatus::Published => "published",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EpisodeStatus::Draft),
            "pending_publish" => Some(EpisodeStatus::PendingPublish),
            "published" => Some(EpisodeStatus::Published),
            _ => None,
        }
    }
}

/// One aligned Spanish/English span pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub spanish: String,
    pub english: String,
    pub start_index: u32,
    pub end_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub episode_id: String,
    pub episode_number: u32,
    pub title: String,
    pub publish_date: String,
    pub duration: String,
    #[serde(default)]
    pub description: String,
    pub audio_url: String,
    #[serde(default)]
    pub shownotes: String,
    #[serde(default)]
    pub translations: Vec<Translation>,
    #[serde(default)]
    pub google_docs_urls: Vec<String>,
    #[serde(default)]
    pub status: EpisodeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodesIndex {
    pub episodes: Vec<Episode>,
    pub last_updated: String,
}

impl EpisodesIndex {
    pub fn empty() -> Self {
        Self {
            episodes: Vec::new(),
            last_updated: now_iso(),
        }
    }

    pub fn max_episode_number(&self) -> Option<u32> {
        self.episodes.iter().map(|e| e.episode_number).max()
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            total_episodes: self.episodes.len(),
            last_updated: Some(self.last_updated.clone()),
            episodes: self.episodes.iter().map(EpisodeSummary::from).collect(),
        }
    }
}

/// Read-only view of the stored index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub total_episodes: usize,
    pub last_updated: Option<String>,
    pub episodes: Vec<EpisodeSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub episode_number: u32,
    pub title: String,
    pub publish_date: String,
    pub status: EpisodeStatus,
    pub has_shownotes: bool,
}

impl From<&Episode> for EpisodeSummary {
    fn from(ep: &Episode) -> Self {
        Self {
            episode_number: ep.episode_number,
            title: ep.title.clone(),
            publish_date: ep.publish_date.clone(),
            status: ep.status,
            has_shownotes: !ep.shownotes.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    Date,
    #[default]
    Episode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sort a copy of the episodes by publish date or episode number.
/// Unparsable dates sort as the epoch.
pub fn sort_episodes(episodes: &[Episode], by: SortBy, order: SortOrder) -> Vec<Episode> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by(|a, b| {
        let ord = match by {
            SortBy::Date => {
                let ta = parse_instant(&a.publish_date).map(|d| d.timestamp_millis()).unwrap_or(0);
                let tb = parse_instant(&b.publish_date).map(|d| d.timestamp_millis()).unwrap_or(0);
                ta.cmp(&tb)
            }
            SortBy::Episode => a.episode_number.cmp(&b.episode_number),
        };
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    sorted
}

/// Case-insensitive match over title, description and the episode number.
pub fn search_episodes(episodes: &[Episode], query: &str) -> Vec<Episode> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return episodes.to_vec();
    }
    episodes
        .iter()
        .filter(|ep| {
            ep.title.to_lowercase().contains(&term)
                || ep.episode_number.to_string().contains(&term)
                || ep.description.to_lowercase().contains(&term)
        })
        .cloned()
        .collect()
}

/// `HH:MM:SS` or `MM:SS` to seconds; anything else, or a total that
/// overflows, is 0.
pub fn parse_duration(duration: &str) -> u64 {
    let parts: Option<Vec<u64>> = duration
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect();
    let total = match parts.as_deref() {
        Some([h, m, s]) => h
            .checked_mul(3600)
            .and_then(|h| m.checked_mul(60)?.checked_add(h))
            .and_then(|hm| hm.checked_add(*s)),
        Some([m, s]) => m.checked_mul(60).and_then(|m| m.checked_add(*s)),
        _ => None,
    };
    total.unwrap_or(0)
}

/// Seconds to `HH:MM:SS`, or `MM:SS` under one hour.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Parse the date shapes seen in feeds and admin forms: RFC 2822
/// (`pubDate`), RFC 3339, naive date-times and bare dates (taken as UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
