use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use podcast_indexer::config;
use podcast_indexer::extract::extract_fields;
use podcast_indexer::feed::{parse_feed, FeedSource, HttpFeedSource};
use podcast_indexer::model::EpisodesIndex;
use serde_json::json;

/// Fetch the feed and dump what the indexer would see, without touching the store.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Number of raw items to print
    #[arg(long, default_value_t = 3)]
    sample: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let source = HttpFeedSource::new(&cfg.feed_url(), Duration::from_secs(cfg.feed.timeout_secs))?;
    let policy = cfg.numbering_policy();

    let text = source.fetch().await?;
    let items = parse_feed(&text)?;
    let empty = EpisodesIndex::empty();

    let samples: Vec<_> = items
        .iter()
        .take(args.sample)
        .map(|item| {
            let fields = extract_fields(item);
            let number = policy
                .resolve(&fields.title, &fields.episode_hint, &empty)
                .map(|r| r.number);
            json!({
                "raw": item,
                "title": fields.title,
                "audioUrl": fields.audio_url,
                "publishDate": fields.publish_date,
                "episodeNumber": number,
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "totalItems": items.len(),
            "policy": policy.name(),
            "sampleItems": samples,
        }))?
    );
    Ok(())
}
