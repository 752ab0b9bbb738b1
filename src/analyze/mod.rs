// src/analyze/mod.rs
//! Classification pipeline entry: rules → matcher → weights, plus the
//! display-mode aware digest builders used by the binary.

pub mod matcher;
pub mod rules;
pub mod weights;

use serde::Serialize;

use crate::aggregate::{aggregate, aggregate_rss};
use crate::config::{DigestConfig, DisplayMode};
use crate::regroup::regroup_by_source;
use crate::types::{GroupStat, History, NewItemsIndex, RssItem, Snapshot};

// Re-export convenient types.
pub use crate::analyze::matcher::{CompiledRules, MatchEngine, WordGroup, WordSpec};
pub use crate::analyze::rules::{compile_rules, compile_rules_str, load_rules_file, HotReloadRules};
pub use crate::analyze::weights::{news_weight, Weights};

/// Final digest handed to rendering/notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub display_mode: DisplayMode,
    pub stats: Vec<GroupStat>,
    pub total: usize,
}

/// Ranked-list digest honoring the configured mode and display mode.
pub fn build_digest(
    snapshot: &Snapshot,
    history: &History,
    new_index: &NewItemsIndex,
    rules: &CompiledRules,
    cfg: &DigestConfig,
) -> Digest {
    let opts = cfg.aggregate_options();
    let (stats, total) = aggregate(snapshot, rules, history, new_index, &opts);
    finish(cfg, stats, total, cfg.rank_threshold)
}

/// RSS digest honoring the configured display mode.
pub fn build_rss_digest(
    items: &[RssItem],
    new_items: &[RssItem],
    rules: &CompiledRules,
    cfg: &DigestConfig,
) -> Digest {
    let opts = cfg.rss_options();
    let (stats, total) = aggregate_rss(items, rules, new_items, &opts);
    finish(cfg, stats, total, cfg.rss.rank_threshold)
}

fn finish(cfg: &DigestConfig, stats: Vec<GroupStat>, total: usize, rank_threshold: u32) -> Digest {
    let stats = match cfg.display_mode {
        DisplayMode::Keyword => stats,
        DisplayMode::Platform if stats.is_empty() => stats,
        DisplayMode::Platform => regroup_by_source(&stats, &cfg.weights, rank_threshold),
    };
    Digest {
        display_mode: cfg.display_mode,
        stats,
        total,
    }
}
