// src/regroup.rs
//! By-source view of already computed topic stats.

use std::collections::{HashMap, HashSet};

use crate::analyze::weights::{sort_by_weight, Weights};
use crate::types::{GroupStat, TitleSummary};

/// Re-key topic stats by source name.
///
/// Each title is tagged with the topic it came from, deduplicated by exact
/// title text within a source (first occurrence wins), re-sorted by weight.
/// Sources are ordered by descending item count, ties in first-seen order.
/// `percentage` is left at 0: its denominator no longer means anything.
pub fn regroup_by_source(
    topic_stats: &[GroupStat],
    weights: &Weights,
    rank_threshold: u32,
) -> Vec<GroupStat> {
    let mut order: Vec<String> = Vec::new();
    let mut by_source: HashMap<String, (Vec<TitleSummary>, HashSet<String>)> = HashMap::new();

    for stat in topic_stats {
        for title in &stat.titles {
            let (titles, seen) = by_source
                .entry(title.source_name.clone())
                .or_insert_with(|| {
                    order.push(title.source_name.clone());
                    (Vec::new(), HashSet::new())
                });
            if !seen.insert(title.title.clone()) {
                continue;
            }
            let mut tagged = title.clone();
            tagged.matched_group = Some(stat.label.clone());
            titles.push(tagged);
        }
    }

    let mut out: Vec<GroupStat> = order
        .into_iter()
        .enumerate()
        .filter_map(|(position, source)| {
            let (mut titles, _) = by_source.remove(&source)?;
            sort_by_weight(&mut titles, rank_threshold, weights);
            Some(GroupStat {
                label: source,
                count: titles.len(),
                position,
                titles,
                percentage: 0.0,
            })
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}
