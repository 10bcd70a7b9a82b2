//! Identity matching between a candidate episode and an index.
//!
//! Two episodes are the same when any of these hold:
//! - same episode number
//! - same audio URL
//! - same title and same publish date
use crate::model::{Episode, EpisodesIndex};

pub fn is_same_episode(a: &Episode, b: &Episode) -> bool {
    a.episode_number == b.episode_number
        || a.audio_url == b.audio_url
        || (a.title == b.title && a.publish_date == b.publish_date)
}

/// First episode in `index` that matches `candidate`, with its position.
pub fn find_existing<'a>(candidate: &Episode, index: &'a EpisodesIndex) -> Option<(usize, &'a Episode)> {
    index
        .episodes
        .iter()
        .enumerate()
        .find(|(_, existing)| is_same_episode(existing, candidate))
}
