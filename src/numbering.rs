//! Episode number resolution.
//!
//! Two mutually exclusive strategies exist. The active one is chosen from
//! configuration at startup and never switched at runtime:
//!
//! - [`NumberingPolicy::TitleFirst`]: the title is the source of truth. The
//!   configured intro title maps to `0`, a `"194. "` prefix gives `194`, and a
//!   non-zero `itunes:episode` is only a fallback that gets flagged for manual
//!   review. Anything else is rejected. Valid numbers start at `0`.
//! - [`NumberingPolicy::HintFirst`]: a non-zero `itunes:episode` wins, then an
//!   `episode`/`ep`/`#` number anywhere in the title, then one past the
//!   highest number already in the index (`1` for an empty index). Never
//!   rejects. Valid numbers start at `1`.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::EpisodesIndex;

static TITLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.\s+").expect("valid title prefix regex"));
static TITLE_EMBEDDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bep(?:isode)?\.?|#)\s*(\d+)").expect("valid embedded number regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberingPolicy {
    TitleFirst { intro_title: String },
    HintFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSource {
    IntroTitle,
    TitlePrefix,
    ItunesHint,
    TitleEmbedded,
    NextInSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedNumber {
    pub number: u32,
    pub source: NumberSource,
    /// Set when the number did not come from the policy's primary source.
    pub needs_review: bool,
}

impl NumberingPolicy {
    /// Smallest episode number the policy considers valid.
    pub fn min_episode_number(&self) -> u32 {
        match self {
            NumberingPolicy::TitleFirst { .. } => 0,
            NumberingPolicy::HintFirst => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumberingPolicy::TitleFirst { .. } => "title_first",
            NumberingPolicy::HintFirst => "hint_first",
        }
    }

    /// Resolve a number for `title`. `None` means the item must be skipped.
    /// `index` is only consulted by the hint-first sequence fallback.
    pub fn resolve(&self, title: &str, hint: &str, index: &EpisodesIndex) -> Option<ResolvedNumber> {
        let title = title.trim();
        let hint = parse_hint(hint);
        match self {
            NumberingPolicy::TitleFirst { intro_title } => {
                if title == intro_title.as_str() {
                    return Some(ResolvedNumber {
                        number: 0,
                        source: NumberSource::IntroTitle,
                        needs_review: false,
                    });
                }
                if let Some(number) = capture_number(&TITLE_PREFIX, title) {
                    return Some(ResolvedNumber {
                        number,
                        source: NumberSource::TitlePrefix,
                        needs_review: false,
                    });
                }
                hint.map(|number| ResolvedNumber {
                    number,
                    source: NumberSource::ItunesHint,
                    needs_review: true,
                })
            }
            NumberingPolicy::HintFirst => {
                if let Some(number) = hint {
                    return Some(ResolvedNumber {
                        number,
                        source: NumberSource::ItunesHint,
                        needs_review: false,
                    });
                }
                if let Some(number) =
                    capture_number(&TITLE_EMBEDDED, title).filter(|n| *n > 0)
                {
                    return Some(ResolvedNumber {
                        number,
                        source: NumberSource::TitleEmbedded,
                        needs_review: false,
                    });
                }
                let number = index
                    .max_episode_number()
                    .map_or(1, |max| max.saturating_add(1));
                Some(ResolvedNumber {
                    number,
                    source: NumberSource::NextInSequence,
                    needs_review: true,
                })
            }
        }
    }
}

fn capture_number(re: &Regex, title: &str) -> Option<u32> {
    re.captures(title)?.get(1)?.as_str().parse().ok()
}

/// Base-10 leading integer of an `itunes:episode` value, like `parseInt`.
/// Zero, negative and non-numeric hints are treated as absent.
pub fn parse_hint(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if negative || end == 0 {
        return None;
    }
    digits[..end].parse::<u32>().ok().filter(|n| *n > 0)
}
