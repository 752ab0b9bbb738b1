// src/aggregate.rs
//! Aggregation loop: compile → scope → classify → weight → sort.
//!
//! Two variants share the bucket finalization:
//! - [`aggregate`] for ranked-list snapshots keyed by (source, title)
//! - [`aggregate_rss`] for RSS entries keyed by URL, ranked by recency
//!
//! Both are pure with respect to their inputs. Dedup state lives in the
//! call, so concurrent callers never share it.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

use crate::analyze::matcher::{CompiledRules, MatchEngine, WordGroup};
use crate::analyze::weights::{sort_by_weight, Weights};
use crate::debug::dev_log_classified;
use crate::metrics::record_run;
use crate::scope::{self, ReportMode, Scope};
use crate::summary::{format_published, format_time_display};
use crate::types::{
    percentage, GroupStat, History, NewItemsIndex, RawItem, RssItem, Snapshot, TitleSummary,
};

pub const CATCH_ALL_GROUP_KEY: &str = "全部新闻";
pub const CATCH_ALL_RSS_GROUP_KEY: &str = "全部 RSS";

/// Rank used when neither snapshot nor history knows any position.
pub const DEFAULT_RANK: u32 = 99;
pub const DEFAULT_RANK_THRESHOLD: u32 = 3;
pub const DEFAULT_RSS_RANK_THRESHOLD: u32 = 5;
/// Asia/Shanghai.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub mode: ReportMode,
    pub weights: Weights,
    pub rank_threshold: u32,
    /// Pipeline-wide cap per group; 0 = uncapped.
    pub max_per_group: usize,
    /// Order groups by `(position, -count)` instead of `(-count, position)`.
    pub sort_by_position_first: bool,
    /// Suppresses progress logging only.
    pub quiet: bool,
    /// Source id → display name; unknown ids display as themselves.
    pub source_names: BTreeMap<String, String>,
    /// Explicit bootstrap flag for incremental mode.
    pub first_crawl_of_day: Option<bool>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            mode: ReportMode::Daily,
            weights: Weights::default(),
            rank_threshold: DEFAULT_RANK_THRESHOLD,
            max_per_group: 0,
            sort_by_position_first: false,
            quiet: false,
            source_names: BTreeMap::new(),
            first_crawl_of_day: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RssOptions {
    pub weights: Weights,
    pub rank_threshold: u32,
    pub max_per_group: usize,
    pub sort_by_position_first: bool,
    pub quiet: bool,
    /// Offset used to render publish times.
    pub utc_offset_minutes: i32,
}

impl Default for RssOptions {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            rank_threshold: DEFAULT_RSS_RANK_THRESHOLD,
            max_per_group: 0,
            sort_by_position_first: false,
            quiet: false,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

/// Per-group accumulator.
#[derive(Debug, Default, Clone)]
struct Bucket {
    count: usize,
    titles: Vec<TitleSummary>,
}

/// Classify, enrich and rank a ranked-list snapshot.
///
/// Returns the ordered group stats and the number of titles considered
/// (the size of the working set before dedup and filtering).
pub fn aggregate(
    snapshot: &Snapshot,
    rules: &CompiledRules,
    history: &History,
    new_index: &NewItemsIndex,
    opts: &AggregateOptions,
) -> (Vec<GroupStat>, usize) {
    let engine = MatchEngine::new(rules, CATCH_ALL_GROUP_KEY);
    if engine.is_catch_all() && !opts.quiet {
        info!(target: "digest", "no word groups configured; reporting every title");
    }

    let scope = scope::select(
        opts.mode,
        snapshot,
        history,
        new_index,
        opts.first_crawl_of_day,
    );

    let mut buckets = vec![Bucket::default(); engine.groups().len()];
    let mut processed: HashSet<(&str, &str)> = HashSet::new();
    let mut total = 0usize;
    let mut matched = 0usize;

    for (source_id, titles) in scope.items.iter() {
        total += titles.len();
        for (title, raw) in titles {
            let key = (source_id.as_str(), title.as_str());
            if processed.contains(&key) {
                continue;
            }
            let Some(idx) = engine.classify_index(title) else {
                dev_log_classified(source_id, title, None);
                continue;
            };
            dev_log_classified(source_id, title, Some(engine.groups()[idx].label()));

            let summary = build_summary(source_id, title, raw, history, new_index, &scope, opts);
            let bucket = &mut buckets[idx];
            bucket.count += 1;
            bucket.titles.push(summary);
            processed.insert(key);
            matched += 1;
        }
    }

    if !opts.quiet {
        log_run_summary(opts, snapshot, new_index, &scope, &engine, total, matched);
    }

    let stats = finalize_groups(
        engine.groups(),
        buckets,
        total,
        &opts.weights,
        opts.rank_threshold,
        opts.max_per_group,
        opts.sort_by_position_first,
        true,
    );
    record_run("ranked", total, matched, stats.len());
    (stats, total)
}

/// Merge snapshot data with the day-scoped history; history wins.
fn build_summary(
    source_id: &str,
    title: &str,
    raw: &RawItem,
    history: &History,
    new_index: &NewItemsIndex,
    scope: &Scope<'_>,
    opts: &AggregateOptions,
) -> TitleSummary {
    let mut ranks = raw.ranks.clone();
    let mut url = raw.url.clone();
    let mut mobile_url = raw.mobile_url.clone();
    let mut image_url = raw.image_url.clone();
    let mut first_time = String::new();
    let mut last_time = String::new();
    let mut count = 1;

    if let Some(info) = history.get(source_id).and_then(|t| t.get(title)) {
        first_time = info.first_time.clone();
        last_time = info.last_time.clone();
        count = info.count;
        if !info.ranks.is_empty() {
            ranks = info.ranks.clone();
        }
        if let Some(u) = &info.url {
            url = u.clone();
        }
        if let Some(u) = &info.mobile_url {
            mobile_url = u.clone();
        }
        if let Some(u) = &info.image_url {
            image_url = u.clone();
        }
    }

    if ranks.is_empty() {
        ranks = vec![DEFAULT_RANK];
    }

    let is_new = scope.all_are_new
        || new_index
            .get(source_id)
            .is_some_and(|titles| titles.contains(title));

    TitleSummary {
        title: title.to_string(),
        source_id: source_id.to_string(),
        source_name: opts
            .source_names
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| source_id.to_string()),
        time_display: format_time_display(&first_time, &last_time),
        first_time,
        last_time,
        count,
        ranks,
        rank_threshold: opts.rank_threshold,
        url,
        mobile_url,
        image_url,
        is_new,
        matched_group: None,
    }
}

fn log_run_summary(
    opts: &AggregateOptions,
    snapshot: &Snapshot,
    new_index: &NewItemsIndex,
    scope: &Scope<'_>,
    engine: &MatchEngine,
    considered: usize,
    matched: usize,
) {
    let filter_status = if engine.is_catch_all() {
        "show all"
    } else {
        "keyword match"
    };
    let snapshot_total: usize = snapshot.values().map(|t| t.len()).sum();
    match opts.mode {
        ReportMode::Daily => info!(
            target: "digest",
            mode = "daily",
            considered,
            matched,
            filter_status,
            "daily rollup"
        ),
        ReportMode::Current => info!(
            target: "digest",
            mode = "current",
            latest_batch = scope.latest_batch.as_deref().unwrap_or(""),
            snapshot_total,
            considered,
            matched,
            filter_status,
            "current leaderboard"
        ),
        ReportMode::Incremental if scope.bootstrap => info!(
            target: "digest",
            mode = "incremental",
            snapshot_total,
            matched,
            filter_status,
            "first crawl of the day"
        ),
        ReportMode::Incremental => {
            let new_total: usize = new_index.values().map(|t| t.len()).sum();
            if new_total == 0 {
                info!(target: "digest", mode = "incremental", "no new titles detected");
            } else {
                info!(
                    target: "digest",
                    mode = "incremental",
                    new_total,
                    matched,
                    filter_status,
                    "incremental delta"
                );
                if matched == 0 && !engine.is_catch_all() {
                    warn!(
                        target: "digest",
                        mode = "incremental",
                        "no new title matched any group; nothing to notify"
                    );
                }
            }
        }
    }
}

/// Sort, cap and order buckets into `GroupStat`s.
#[allow(clippy::too_many_arguments)]
fn finalize_groups(
    groups: &[WordGroup],
    buckets: Vec<Bucket>,
    total: usize,
    weights: &Weights,
    rank_threshold: u32,
    default_cap: usize,
    sort_by_position_first: bool,
    keep_empty: bool,
) -> Vec<GroupStat> {
    let mut stats: Vec<GroupStat> = groups
        .iter()
        .zip(buckets)
        .enumerate()
        .filter(|(_, (_, bucket))| keep_empty || bucket.count > 0)
        .map(|(position, (group, bucket))| {
            let mut titles = bucket.titles;
            sort_by_weight(&mut titles, rank_threshold, weights);
            let cap = if group.max_count > 0 {
                group.max_count
            } else {
                default_cap
            };
            if cap > 0 {
                titles.truncate(cap);
            }
            GroupStat {
                label: group.label().to_string(),
                count: bucket.count,
                position,
                titles,
                percentage: percentage(bucket.count, total),
            }
        })
        .collect();

    if sort_by_position_first {
        stats.sort_by(|a, b| a.position.cmp(&b.position).then(b.count.cmp(&a.count)));
    } else {
        stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.position.cmp(&b.position)));
    }
    stats
}

/// RSS variant: rank is the recency order of `published_at` (most recent
/// = 1), novelty is URL membership in `new_items`, dedup is by URL.
/// Groups without matches are omitted.
pub fn aggregate_rss(
    items: &[RssItem],
    rules: &CompiledRules,
    new_items: &[RssItem],
    opts: &RssOptions,
) -> (Vec<GroupStat>, usize) {
    if items.is_empty() {
        return (Vec::new(), 0);
    }

    let engine = MatchEngine::new(rules, CATCH_ALL_RSS_GROUP_KEY);
    if engine.is_catch_all() && !opts.quiet {
        info!(target: "digest", variant = "rss", "no word groups configured; reporting every entry");
    }

    let new_urls: HashSet<&str> = new_items
        .iter()
        .map(|it| it.url.as_str())
        .filter(|u| !u.is_empty())
        .collect();

    let url_to_rank = recency_ranks(items);
    let total = items.len();
    let mut buckets = vec![Bucket::default(); engine.groups().len()];
    let mut processed_urls: HashSet<&str> = HashSet::new();

    for item in items {
        let url = item.url.as_str();
        if !url.is_empty() && !processed_urls.insert(url) {
            continue;
        }

        let Some(idx) = engine.classify_index(&item.title) else {
            dev_log_classified(&item.feed_id, &item.title, None);
            continue;
        };
        dev_log_classified(&item.feed_id, &item.title, Some(engine.groups()[idx].label()));

        let rank = url_to_rank.get(url).copied().unwrap_or(DEFAULT_RANK);
        let published = item.published_at.clone().unwrap_or_default();
        let time_display = if published.is_empty() {
            String::new()
        } else {
            format_published(&published, opts.utc_offset_minutes)
        };

        let summary = TitleSummary {
            title: item.title.clone(),
            source_id: item.feed_id.clone(),
            source_name: rss_source_name(item),
            first_time: published.clone(),
            last_time: published,
            time_display,
            count: 1,
            ranks: vec![rank],
            rank_threshold: opts.rank_threshold,
            url: item.url.clone(),
            mobile_url: String::new(),
            image_url: item.image_url.clone().unwrap_or_default(),
            is_new: !url.is_empty() && new_urls.contains(url),
            matched_group: None,
        };
        let bucket = &mut buckets[idx];
        bucket.count += 1;
        bucket.titles.push(summary);
    }

    let stats = finalize_groups(
        engine.groups(),
        buckets,
        total,
        &opts.weights,
        opts.rank_threshold,
        opts.max_per_group,
        opts.sort_by_position_first,
        false,
    );
    let matched: usize = stats.iter().map(|s| s.count).sum();
    if !opts.quiet {
        info!(target: "digest", variant = "rss", matched, total, "rss keyword grouping");
    }
    record_run("rss", total, matched, stats.len());
    (stats, total)
}

/// URL → 1-based position in publish-time order, newest first.
/// Entries without a URL get no rank.
fn recency_ranks(items: &[RssItem]) -> HashMap<&str, u32> {
    let mut order: Vec<&RssItem> = items.iter().collect();
    order.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let mut ranks = HashMap::with_capacity(order.len());
    for (idx, item) in order.into_iter().enumerate() {
        if !item.url.is_empty() {
            ranks.insert(item.url.as_str(), idx as u32 + 1);
        }
    }
    ranks
}

fn rss_source_name(item: &RssItem) -> String {
    match item.feed_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ if !item.feed_id.is_empty() => item.feed_id.clone(),
        _ => "RSS".to_string(),
    }
}
