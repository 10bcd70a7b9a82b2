//! Feed item to canonical episode.
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::extract::extract_fields;
use crate::feed::FeedItem;
use crate::links::extract_google_docs_urls;
use crate::model::{parse_instant, Episode, EpisodeStatus, EpisodesIndex};
use crate::numbering::NumberingPolicy;

/// Why a feed item did not produce an episode. Never fatal for the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing title")]
    MissingTitle,
    #[error("missing audio URL")]
    MissingAudioUrl,
    #[error("title does not carry an episode number, needs manual review: {0:?}")]
    UnresolvedNumber(String),
    #[error("validation failed: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Build a fresh draft episode from one feed item.
///
/// `index` is the index the episode is headed for; the hint-first policy
/// numbers unnumbered items after its highest episode.
pub fn build_episode(
    item: &FeedItem,
    index: &EpisodesIndex,
    policy: &NumberingPolicy,
) -> Result<Episode, SkipReason> {
    let fields = extract_fields(item);
    if !fields.is_usable() {
        warn!(
            title = !fields.title.is_empty(),
            audio_url = !fields.audio_url.is_empty(),
            "skipping item with missing title or audio URL"
        );
        return Err(if fields.title.is_empty() {
            SkipReason::MissingTitle
        } else {
            SkipReason::MissingAudioUrl
        });
    }

    let resolved = policy
        .resolve(&fields.title, &fields.episode_hint, index)
        .ok_or_else(|| SkipReason::UnresolvedNumber(fields.title.clone()))?;
    if resolved.needs_review {
        warn!(
            number = resolved.number,
            source = ?resolved.source,
            title = %fields.title,
            "episode number taken from a fallback source"
        );
    }

    let google_docs_urls = extract_google_docs_urls(&fields.description);
    if !google_docs_urls.is_empty() {
        debug!(count = google_docs_urls.len(), "found Google Docs links");
    }

    let episode = Episode {
        episode_id: Uuid::new_v4().to_string(),
        episode_number: resolved.number,
        title: fields.title,
        publish_date: fields.publish_date,
        duration: fields.duration,
        description: fields.description,
        audio_url: fields.audio_url,
        shownotes: String::new(),
        translations: Vec::new(),
        google_docs_urls,
        status: EpisodeStatus::Draft,
    };

    let errors = validate_episode(&episode, policy.min_episode_number());
    if !errors.is_empty() {
        return Err(SkipReason::Invalid(errors));
    }
    Ok(episode)
}

/// Structural checks shared by feed-built episodes and manual updates.
pub fn validate_episode(episode: &Episode, min_number: u32) -> Vec<String> {
    let mut errors = Vec::new();
    if episode.title.trim().is_empty() {
        errors.push("Title is required".to_string());
    }
    if episode.episode_number < min_number {
        errors.push("Valid episode number is required".to_string());
    }
    if episode.publish_date.trim().is_empty() {
        errors.push("Publish date is required".to_string());
    } else if parse_instant(&episode.publish_date).is_none() {
        errors.push("Valid publish date is required".to_string());
    }
    if episode.audio_url.trim().is_empty() {
        errors.push("Audio URL is required".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const INTRO: &str = "¡Cuéntame! -What is this podcast all about?";

    fn title_first() -> NumberingPolicy {
        NumberingPolicy::TitleFirst {
            intro_title: INTRO.to_string(),
        }
    }

    fn item(v: Value) -> FeedItem {
        FeedItem::from_value(v).unwrap()
    }

    #[test]
    fn builds_numbered_draft() {
        let ep = build_episode(
            &item(json!({
                "title": "194. La inteligencia artificial",
                "enclosure": { "url": "https://x/ep194.mp3" },
                "pubDate": "2024-01-01"
            })),
            &EpisodesIndex::empty(),
            &title_first(),
        )
        .unwrap();
        assert_eq!(ep.episode_number, 194);
        assert_eq!(ep.status, EpisodeStatus::Draft);
        assert_eq!(ep.shownotes, "");
        assert!(ep.translations.is_empty());
        assert_eq!(ep.publish_date, "2024-01-01T00:00:00.000Z");
        assert!(Uuid::parse_str(&ep.episode_id).is_ok());
    }

    #[test]
    fn builds_intro_episode_zero() {
        let ep = build_episode(
            &item(json!({
                "title": INTRO,
                "enclosure": { "url": "https://x/intro.mp3" }
            })),
            &EpisodesIndex::empty(),
            &title_first(),
        )
        .unwrap();
        assert_eq!(ep.episode_number, 0);
    }

    #[test]
    fn fresh_identity_every_build() {
        let raw = item(json!({
            "title": "3. Tres",
            "enclosure": { "url": "https://x/3.mp3" },
            "pubDate": "2024-01-01"
        }));
        let index = EpisodesIndex::empty();
        let a = build_episode(&raw, &index, &title_first()).unwrap();
        let b = build_episode(&raw, &index, &title_first()).unwrap();
        assert_ne!(a.episode_id, b.episode_id);
        assert_eq!(a.episode_number, b.episode_number);
    }

    #[test]
    fn links_come_from_description() {
        let ep = build_episode(
            &item(json!({
                "title": "5. Cinco",
                "description": "<a href=\"https://docs.google.com/document/d/ABC\">doc</a>",
                "enclosure": { "@_url": "https://x/5.mp3" }
            })),
            &EpisodesIndex::empty(),
            &title_first(),
        )
        .unwrap();
        assert_eq!(ep.google_docs_urls, vec!["https://docs.google.com/document/d/ABC".to_string()]);
    }

    #[test]
    fn unusable_items_are_skipped() {
        let index = EpisodesIndex::empty();
        let err = build_episode(&item(json!({ "enclosure": { "url": "https://x/a.mp3" } })), &index, &title_first())
            .unwrap_err();
        assert_eq!(err, SkipReason::MissingTitle);
        let err = build_episode(&item(json!({ "title": "1. Uno" })), &index, &title_first()).unwrap_err();
        assert_eq!(err, SkipReason::MissingAudioUrl);
    }

    #[test]
    fn unnumbered_title_is_rejected_under_title_first() {
        let err = build_episode(
            &item(json!({ "title": "Especial", "enclosure": { "url": "https://x/e.mp3" } })),
            &EpisodesIndex::empty(),
            &title_first(),
        )
        .unwrap_err();
        assert!(matches!(err, SkipReason::UnresolvedNumber(_)));
    }

    #[test]
    fn invalid_date_fails_validation() {
        let err = build_episode(
            &item(json!({
                "title": "8. Ocho",
                "enclosure": { "url": "https://x/8.mp3" },
                "pubDate": "not a date"
            })),
            &EpisodesIndex::empty(),
            &title_first(),
        )
        .unwrap_err();
        assert_eq!(err, SkipReason::Invalid(vec!["Valid publish date is required".into()]));
    }

    #[test]
    fn validation_respects_policy_floor() {
        let ep = Episode {
            episode_id: "id".into(),
            episode_number: 0,
            title: "Intro".into(),
            publish_date: "2024-01-01T00:00:00.000Z".into(),
            duration: "00:00:00".into(),
            description: String::new(),
            audio_url: "https://x/0.mp3".into(),
            shownotes: String::new(),
            translations: Vec::new(),
            google_docs_urls: Vec::new(),
            status: EpisodeStatus::Draft,
        };
        assert!(validate_episode(&ep, 0).is_empty());
        assert_eq!(validate_episode(&ep, 1), vec!["Valid episode number is required".to_string()]);
    }
}
