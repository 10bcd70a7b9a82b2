//! Configuration loader and validator for the feed indexer.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::numbering::NumberingPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub feed: Feed,
    pub store: Store,
    pub numbering: Numbering,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub sync_interval_secs: u64,
}

/// Podcast feed location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feed {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Key-value document settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    #[serde(default = "default_index_key")]
    pub index_key: String,
}

/// Episode numbering strategy, fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Numbering {
    TitleFirst { intro_title: String },
    HintFirst,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_index_key() -> String {
    "episodes_index".to_string()
}

impl App {
    /// Data dir with a leading `~/` expanded against `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    pub fn numbering_policy(&self) -> NumberingPolicy {
        match &self.numbering {
            Numbering::TitleFirst { intro_title } => NumberingPolicy::TitleFirst {
                intro_title: intro_title.trim().to_string(),
            },
            Numbering::HintFirst => NumberingPolicy::HintFirst,
        }
    }

    /// SQLite URL for the index store. `DATABASE_URL` wins when set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/index.db", self.app.resolved_data_dir()))
    }

    /// Feed URL. `RSS_FEED_URL` wins when set.
    pub fn feed_url(&self) -> String {
        self.effective_feed_url(std::env::var("RSS_FEED_URL").ok())
    }

    fn effective_feed_url(&self, env_override: Option<String>) -> String {
        env_override
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.feed.url.clone())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance, using the feed URL in effect after
/// the `RSS_FEED_URL` override.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    validate_with_feed_url(cfg, &cfg.feed_url())
}

fn validate_with_feed_url(cfg: &Config, feed_url: &str) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.sync_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.sync_interval_secs must be > 0"));
    }

    let url = feed_url.trim();
    if url.is_empty() {
        return Err(ConfigError::Invalid("feed.url must be non-empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid("feed.url must be an http(s) URL"));
    }
    if cfg.feed.timeout_secs == 0 {
        return Err(ConfigError::Invalid("feed.timeout_secs must be > 0"));
    }

    if cfg.store.index_key.trim().is_empty() {
        return Err(ConfigError::Invalid("store.index_key must be non-empty"));
    }

    if let Numbering::TitleFirst { intro_title } = &cfg.numbering {
        if intro_title.trim().is_empty() {
            return Err(ConfigError::Invalid("numbering.intro_title must be non-empty"));
        }
    }

    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  sync_interval_secs: 3600

feed:
  url: "https://example.com/podcast/rss"
  timeout_secs: 30

store:
  index_key: "episodes_index"

numbering:
  policy: title_first
  intro_title: "¡Cuéntame! -What is this podcast all about?"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.store.index_key, "episodes_index");
        assert!(matches!(
            cfg.numbering_policy(),
            NumberingPolicy::TitleFirst { ref intro_title } if intro_title.starts_with("¡Cuéntame!")
        ));
    }

    #[test]
    fn hint_first_needs_no_intro_title() {
        let yaml = example().replace(
            "  policy: title_first\n  intro_title: \"¡Cuéntame! -What is this podcast all about?\"\n",
            "  policy: hint_first\n",
        );
        let cfg: Config = serde_yaml::from_str(&yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.numbering_policy(), NumberingPolicy::HintFirst);
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let yaml = r#"app:
  data_dir: "./data"
  sync_interval_secs: 60
feed:
  url: "https://example.com/rss"
store: {}
numbering:
  policy: hint_first
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.feed.timeout_secs, 30);
        assert_eq!(cfg.store.index_key, "episodes_index");
    }

    #[test]
    fn invalid_feed_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.feed.url = "".into();
        let err = validate_with_feed_url(&cfg, &cfg.feed.url).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("feed.url")), _ => panic!("wrong error") }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.feed.url = "ftp://example.com/rss".into();
        assert!(matches!(
            validate_with_feed_url(&cfg, &cfg.feed.url),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn feed_url_override_is_validated() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        let overridden = cfg.effective_feed_url(Some("ftp://mirror/rss".into()));
        assert_eq!(overridden, "ftp://mirror/rss");
        let err = validate_with_feed_url(&cfg, &overridden).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("feed.url")), _ => panic!("wrong error") }

        assert_eq!(cfg.effective_feed_url(Some("  ".into())), cfg.feed.url);
        let overridden = cfg.effective_feed_url(Some("https://mirror/rss".into()));
        validate_with_feed_url(&cfg, &overridden).unwrap();
    }

    #[test]
    fn invalid_app_and_store_fields() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.sync_interval_secs = 0;
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("sync_interval_secs")), _ => panic!("wrong error") }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.index_key = "  ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.numbering = Numbering::TitleFirst { intro_title: "".into() };
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("intro_title")), _ => panic!("wrong error") }
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.app.sync_interval_secs, 3600);
    }
}
