// src/config.rs
//! Process configuration: an optional TOML file for the non-secret
//! values, environment variables on top (env wins), secrets env-only.
//! `.env` is honored via dotenvy before any of this runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/listening.toml";
pub const ENV_CONFIG_PATH: &str = "LISTENING_CONFIG_PATH";
pub const ENV_KEYWORD: &str = "LISTEN_KEYWORD";
pub const ENV_STATE_PATH: &str = "STATE_PATH";
pub const ENV_DRY_RUN: &str = "DRY_RUN";

const DEFAULT_KEYWORD: &str = "dagster";
const DEFAULT_CHANNEL: &str = "#social-feed-test";
// The ID walk is cheap per request, so poll it tightly to keep the
// accumulated range small; the search feed is rate-limited, so give it
// room.
const DEFAULT_HN_INTERVAL_SECS: u64 = 15;
const DEFAULT_REDDIT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub channel: String,
    pub interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The one keyword every adapter listens for. Injected read-only
    /// into each cycle, never mutated at runtime.
    pub keyword: String,
    pub hackernews: AdapterSettings,
    pub reddit_posts: AdapterSettings,
    pub reddit_comments: AdapterSettings,
    pub state_path: PathBuf,
    pub dry_run: bool,
}

/// Shape of `config/listening.toml`. Everything optional; defaults
/// cover the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub keyword: Option<String>,
    #[serde(default)]
    pub hackernews: SectionConfig,
    #[serde(default)]
    pub reddit_posts: SectionConfig,
    #[serde(default)]
    pub reddit_comments: SectionConfig,
    pub state_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionConfig {
    pub channel: Option<String>,
    pub interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("parsing listening config")
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(Self::parse(&raw)?))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = FileConfig::load(&path)?.unwrap_or_default();
        Ok(Self::resolve(file))
    }

    /// Merge precedence: env > file > default.
    pub fn resolve(file: FileConfig) -> Self {
        let keyword = std::env::var(ENV_KEYWORD)
            .ok()
            .or(file.keyword)
            .unwrap_or_else(|| DEFAULT_KEYWORD.to_string());

        let state_path = std::env::var(ENV_STATE_PATH)
            .ok()
            .or(file.state_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::state::default_state_path().to_path_buf());

        let dry_run = std::env::var(ENV_DRY_RUN)
            .ok()
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        Self {
            keyword,
            hackernews: section(&file.hackernews, DEFAULT_HN_INTERVAL_SECS),
            reddit_posts: section(&file.reddit_posts, DEFAULT_REDDIT_INTERVAL_SECS),
            reddit_comments: section(&file.reddit_comments, DEFAULT_REDDIT_INTERVAL_SECS),
            state_path,
            dry_run,
        }
    }
}

fn section(cfg: &SectionConfig, default_interval: u64) -> AdapterSettings {
    AdapterSettings {
        channel: cfg
            .channel
            .clone()
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
        interval_secs: cfg.interval_secs.unwrap_or(default_interval),
    }
}
