// src/config/digest.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::aggregate::{
    AggregateOptions, RssOptions, DEFAULT_RANK_THRESHOLD, DEFAULT_RSS_RANK_THRESHOLD,
    DEFAULT_UTC_OFFSET_MINUTES,
};
use crate::analyze::rules::DEFAULT_RULES_PATH;
use crate::analyze::weights::Weights;
use crate::scope::ReportMode;

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_REPORT_MODE: &str = "DIGEST_REPORT_MODE";
pub const ENV_RANK_THRESHOLD: &str = "DIGEST_RANK_THRESHOLD";

fn default_rank_threshold() -> u32 {
    DEFAULT_RANK_THRESHOLD
}
fn default_rss_rank_threshold() -> u32 {
    DEFAULT_RSS_RANK_THRESHOLD
}
fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}
fn default_rules_path() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_PATH)
}

/// How the final digest is keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// One bucket per topic.
    #[default]
    Keyword,
    /// One bucket per source (regrouped view).
    Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RssSection {
    #[serde(default = "default_rss_rank_threshold")]
    pub rank_threshold: u32,
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for RssSection {
    fn default() -> Self {
        Self {
            rank_threshold: default_rss_rank_threshold(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub report_mode: ReportMode,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default = "default_rank_threshold")]
    pub rank_threshold: u32,
    /// Pipeline-wide cap per group; 0 = uncapped.
    #[serde(default)]
    pub max_news_per_keyword: usize,
    #[serde(default)]
    pub sort_by_position_first: bool,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub rss: RssSection,
    /// Source id → display name.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            report_mode: ReportMode::default(),
            display_mode: DisplayMode::default(),
            rank_threshold: default_rank_threshold(),
            max_news_per_keyword: 0,
            sort_by_position_first: false,
            quiet: false,
            rules_path: default_rules_path(),
            weights: Weights::default(),
            rss: RssSection::default(),
            sources: BTreeMap::new(),
        }
    }
}

impl DigestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: DigestConfig = toml::from_str(s).context("parsing digest config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("loading digest config from {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $DIGEST_CONFIG_PATH (must exist)
    /// 2) config/digest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from_file(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// `DIGEST_REPORT_MODE` and `DIGEST_RANK_THRESHOLD` win over the file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(mode) = env::var(ENV_REPORT_MODE) {
            self.report_mode = mode
                .parse()
                .with_context(|| format!("invalid {ENV_REPORT_MODE}"))?;
        }
        if let Ok(raw) = env::var(ENV_RANK_THRESHOLD) {
            self.rank_threshold = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_RANK_THRESHOLD}: {raw}"))?;
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        if self.rank_threshold == 0 {
            self.rank_threshold = default_rank_threshold();
        }
        if self.rss.rank_threshold == 0 {
            self.rss.rank_threshold = default_rss_rank_threshold();
        }
        // harden: non-finite or negative multipliers fall back to defaults
        let defaults = Weights::default();
        if !self.weights.rank.is_finite() || self.weights.rank < 0.0 {
            self.weights.rank = defaults.rank;
        }
        if !self.weights.frequency.is_finite() || self.weights.frequency < 0.0 {
            self.weights.frequency = defaults.frequency;
        }
        if !self.weights.hotness.is_finite() || self.weights.hotness < 0.0 {
            self.weights.hotness = defaults.hotness;
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            mode: self.report_mode,
            weights: self.weights,
            rank_threshold: self.rank_threshold,
            max_per_group: self.max_news_per_keyword,
            sort_by_position_first: self.sort_by_position_first,
            quiet: self.quiet,
            source_names: self.sources.clone(),
            first_crawl_of_day: None,
        }
    }

    pub fn rss_options(&self) -> RssOptions {
        RssOptions {
            weights: self.weights,
            rank_threshold: self.rss.rank_threshold,
            max_per_group: self.max_news_per_keyword,
            sort_by_position_first: self.sort_by_position_first,
            quiet: self.quiet,
            utc_offset_minutes: self.rss.utc_offset_minutes,
        }
    }
}
