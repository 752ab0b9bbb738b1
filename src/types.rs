// src/types.rs
//! Data model shared by the scope selector, the aggregation loop and the
//! regrouper. Inputs are owned by external collaborators (crawler, storage,
//! diff); outputs are built fresh per run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::analyze::weights::{self, Weights};

/// One (source, title) observation within a single crawl snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    /// Observed 1-based list positions; duplicates allowed.
    #[serde(default)]
    pub ranks: Vec<u32>,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "mobileUrl")]
    pub mobile_url: String,
    #[serde(default)]
    pub image_url: String,
}

fn default_count() -> u32 {
    1
}

/// Day-scoped aggregate for one (source, title), maintained by storage.
///
/// Crawl times are the storage layer's `HH-MM` stamps; they compare
/// lexicographically in chronological order within one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalTitleInfo {
    #[serde(default)]
    pub first_time: String,
    #[serde(default)]
    pub last_time: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub ranks: Vec<u32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "mobileUrl")]
    pub mobile_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// `source_id -> title -> item` for one crawl cycle.
pub type Snapshot = BTreeMap<String, BTreeMap<String, RawItem>>;

/// `source_id -> title -> day aggregate`.
pub type History = BTreeMap<String, BTreeMap<String, HistoricalTitleInfo>>;

/// `source_id -> titles` that appeared for the first time in the latest snapshot.
pub type NewItemsIndex = BTreeMap<String, BTreeSet<String>>;

/// A single RSS entry as handed over by the feed collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub feed_id: String,
    #[serde(default)]
    pub feed_name: Option<String>,
    #[serde(default)]
    pub url: String,
    /// RFC 3339 publish time.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Enriched per-title record handed to rendering and notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleSummary {
    pub title: String,
    pub source_id: String,
    pub source_name: String,
    pub first_time: String,
    pub last_time: String,
    pub time_display: String,
    pub count: u32,
    pub ranks: Vec<u32>,
    pub rank_threshold: u32,
    pub url: String,
    pub mobile_url: String,
    pub image_url: String,
    pub is_new: bool,
    /// Topic label, filled in only by the by-source regrouping view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_group: Option<String>,
}

impl TitleSummary {
    /// Best (smallest) observed rank; 999 when no rank is known.
    pub fn min_rank(&self) -> u32 {
        self.ranks.iter().copied().min().unwrap_or(999)
    }

    /// Composite sort weight; see [`weights::news_weight`].
    pub fn weight(&self, rank_threshold: u32, w: &Weights) -> f64 {
        weights::news_weight(&self.ranks, self.count, rank_threshold, w)
    }
}

/// One output bucket: a topic (or, in the regrouped view, a source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
    pub label: String,
    pub count: usize,
    pub position: usize,
    pub titles: Vec<TitleSummary>,
    pub percentage: f64,
}

/// `count / total * 100`, rounded to two decimals; 0 when `total` is 0.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
