use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use podcast_indexer::config::{self, Config};
use podcast_indexer::db::SqliteKvStore;
use podcast_indexer::feed::HttpFeedSource;
use podcast_indexer::model::{
    format_duration, parse_duration, search_episodes, sort_episodes, EpisodesIndex, SortBy,
    SortOrder,
};
use podcast_indexer::service::{EpisodeUpdate, IndexService, PassReport};

#[derive(Debug, Parser)]
#[command(author, version, about = "Keep a podcast episode index in sync with its RSS feed")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add episodes that are new in the feed; existing ones are left alone
    Sync,
    /// Rebuild the index from the feed, keeping shownotes, translations and status
    Reprocess,
    /// Replace the stored index with an empty one
    Reset,
    /// Print the stored index
    Inspect {
        #[arg(long, value_enum, default_value_t = SortArg::Episode)]
        sort: SortArg,
        #[arg(long, value_enum, default_value_t = OrderArg::Desc)]
        order: OrderArg,
        /// Only episodes whose title, number or description contains this
        #[arg(long)]
        query: Option<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a manual edit from a JSON episode file (`-` reads stdin)
    Update { path: PathBuf },
    /// Run `sync` forever on `app.sync_interval_secs`
    Watch,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Date,
    Episode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Asc,
    Desc,
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
    cfg.ensure_dirs()?;
    let service = build_service(&cfg).await?;

    match args.command {
        Command::Sync => {
            let report = service.run_ingestion().await?;
            log_report(&report);
        }
        Command::Reprocess => {
            let report = service.run_reprocess().await?;
            log_report(&report);
        }
        Command::Reset => service.reset_index().await?,
        Command::Inspect {
            sort,
            order,
            query,
            json,
        } => inspect(&service, sort, order, query.as_deref(), json).await?,
        Command::Update { path } => {
            let raw = read_input(&path).await?;
            let update: EpisodeUpdate =
                serde_json::from_str(&raw).context("episode file is not valid JSON")?;
            let episode = service.update_episode(update).await?;
            println!("updated episode {} ({})", episode.episode_number, episode.episode_id);
        }
        Command::Watch => watch(&service, Duration::from_secs(cfg.app.sync_interval_secs)).await,
    }
    Ok(())
}

async fn build_service(cfg: &Config) -> Result<IndexService> {
    let database_url = cfg.database_url();
    let store = SqliteKvStore::connect(&database_url).await?;
    let feed = HttpFeedSource::new(&cfg.feed_url(), Duration::from_secs(cfg.feed.timeout_secs))
        .context("invalid feed URL")?;
    info!(database_url = %database_url, feed = %feed.url(), "index store ready");
    Ok(IndexService::new(
        Arc::new(store),
        Arc::new(feed),
        cfg.numbering_policy(),
        cfg.store.index_key.clone(),
    ))
}

fn log_report(report: &PassReport) {
    for w in &report.warnings {
        warn!(position = w.position, reason = %w.reason, "feed item skipped");
    }
    info!(
        mode = %report.mode,
        feed_items = report.feed_items,
        added = report.added,
        preserved = report.preserved,
        already_present = report.skipped_existing,
        skipped = report.warnings.len(),
        persisted = report.persisted,
        total = report.total_episodes,
        "pass finished"
    );
}

async fn watch(service: &IndexService, every: Duration) {
    info!(interval_secs = every.as_secs(), "watching feed");
    loop {
        match service.run_ingestion().await {
            Ok(report) => log_report(&report),
            // Retried on the next tick.
            Err(err) => error!(?err, "ingestion pass failed"),
        }
        tokio::time::sleep(every).await;
    }
}

async fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn inspect(
    service: &IndexService,
    sort: SortArg,
    order: OrderArg,
    query: Option<&str>,
    json: bool,
) -> Result<()> {
    let Some(index) = service.load_index().await? else {
        if json {
            println!("{}", serde_json::to_string_pretty(&service.inspect_index().await?)?);
        } else {
            println!("No episodes index found");
        }
        return Ok(());
    };

    let by = match sort {
        SortArg::Date => SortBy::Date,
        SortArg::Episode => SortBy::Episode,
    };
    let order = match order {
        OrderArg::Asc => SortOrder::Asc,
        OrderArg::Desc => SortOrder::Desc,
    };
    let episodes = sort_episodes(&search_episodes(&index.episodes, query.unwrap_or("")), by, order);
    let view = EpisodesIndex {
        episodes,
        last_updated: index.last_updated,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view.summary())?);
        return Ok(());
    }

    println!(
        "{} of {} episodes, last updated {}",
        view.episodes.len(),
        index.episodes.len(),
        view.last_updated
    );
    for ep in &view.episodes {
        println!(
            "#{:<4} {:<10} {:<15} {:>8} {} {}",
            ep.episode_number,
            ep.publish_date.get(..10).unwrap_or(ep.publish_date.as_str()),
            ep.status.as_str(),
            format_duration(parse_duration(&ep.duration)),
            if ep.shownotes.is_empty() { " " } else { "*" },
            ep.title
        );
    }
    Ok(())
}
