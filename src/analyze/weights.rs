//! Composite relevance weight used as the sort key inside every bucket.
//!
//! `total = rank * W_rank + frequency * W_freq + hotness * W_hot` where
//! - rank:      mean of `11 - min(r, 10)` over observed ranks
//! - frequency: `min(count, 10) * 10`
//! - hotness:   share of ranks `<= rank_threshold`, times 100
//!
//! The weight is never persisted; only its ordering matters.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::TitleSummary;

pub const MAX_RANK_SCORE: u32 = 10;
pub const BASE_RANK_SCORE: u32 = 11;
pub const FREQUENCY_MULTIPLIER: f64 = 10.0;
pub const HOTNESS_MULTIPLIER: f64 = 100.0;

fn default_rank_weight() -> f64 {
    0.4
}
fn default_frequency_weight() -> f64 {
    0.3
}
fn default_hotness_weight() -> f64 {
    0.3
}

/// Component multipliers; they need not sum to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "default_rank_weight", alias = "RANK_WEIGHT")]
    pub rank: f64,
    #[serde(default = "default_frequency_weight", alias = "FREQUENCY_WEIGHT")]
    pub frequency: f64,
    #[serde(default = "default_hotness_weight", alias = "HOTNESS_WEIGHT")]
    pub hotness: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            rank: default_rank_weight(),
            frequency: default_frequency_weight(),
            hotness: default_hotness_weight(),
        }
    }
}

pub fn rank_component(ranks: &[u32]) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let sum: u32 = ranks
        .iter()
        .map(|&r| BASE_RANK_SCORE - r.min(MAX_RANK_SCORE))
        .sum();
    sum as f64 / ranks.len() as f64
}

pub fn frequency_component(count: u32) -> f64 {
    count.min(MAX_RANK_SCORE) as f64 * FREQUENCY_MULTIPLIER
}

pub fn hotness_component(ranks: &[u32], rank_threshold: u32) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let hot = ranks.iter().filter(|&&r| r <= rank_threshold).count();
    hot as f64 / ranks.len() as f64 * HOTNESS_MULTIPLIER
}

/// Pure weight over a rank history. No ranks at all means weight 0.
pub fn news_weight(ranks: &[u32], count: u32, rank_threshold: u32, w: &Weights) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    rank_component(ranks) * w.rank
        + frequency_component(count) * w.frequency
        + hotness_component(ranks, rank_threshold) * w.hotness
}

/// Order by `(-weight, min rank, -count)`; stable, so ties keep input order.
pub fn sort_by_weight(titles: &mut Vec<TitleSummary>, rank_threshold: u32, w: &Weights) {
    let mut keyed: Vec<(f64, TitleSummary)> = titles
        .drain(..)
        .map(|t| (t.weight(rank_threshold, w), t))
        .collect();
    keyed.sort_by(|(wa, a), (wb, b)| compare_keyed(*wa, a, *wb, b));
    titles.extend(keyed.into_iter().map(|(_, t)| t));
}

fn compare_keyed(wa: f64, a: &TitleSummary, wb: f64, b: &TitleSummary) -> Ordering {
    wb.total_cmp(&wa)
        .then_with(|| a.min_rank().cmp(&b.min_rank()))
        .then_with(|| b.count.cmp(&a.count))
}
