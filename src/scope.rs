//! Temporal scoping: which snapshot items a run looks at, per report mode.
//!
//! - `daily`: the whole snapshot; novelty is resolved per title later
//! - `current`: only titles whose last-seen time equals the latest crawl
//!   batch across the active sources (the live leaderboard)
//! - `incremental`: on the first crawl of the day the whole snapshot, after
//!   that only the new-items index; every item counts as new

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{History, NewItemsIndex, Snapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Daily,
    Current,
    Incremental,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Daily => "daily",
            ReportMode::Current => "current",
            ReportMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ReportMode::Daily),
            "current" => Ok(ReportMode::Current),
            "incremental" => Ok(ReportMode::Incremental),
            other => anyhow::bail!("unknown report mode: {other}"),
        }
    }
}

/// Working set of one run.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    pub items: Cow<'a, Snapshot>,
    pub all_are_new: bool,
    /// `current` mode: the latest last-seen time, when history had one.
    pub latest_batch: Option<String>,
    /// `incremental` mode: first crawl of the day.
    pub bootstrap: bool,
}

/// True when no source has any recorded title yet.
pub fn history_is_empty(history: &History) -> bool {
    history.values().all(|titles| titles.is_empty())
}

/// Pick the working items for `mode`.
///
/// `first_crawl_of_day` overrides bootstrap detection; when `None`, an
/// empty history means bootstrap.
pub fn select<'a>(
    mode: ReportMode,
    snapshot: &'a Snapshot,
    history: &History,
    new_index: &NewItemsIndex,
    first_crawl_of_day: Option<bool>,
) -> Scope<'a> {
    match mode {
        ReportMode::Daily => Scope {
            items: Cow::Borrowed(snapshot),
            all_are_new: false,
            latest_batch: None,
            bootstrap: false,
        },
        ReportMode::Current => {
            let (items, latest_batch) = current_batch(snapshot, history);
            Scope {
                items,
                all_are_new: false,
                latest_batch,
                bootstrap: false,
            }
        }
        ReportMode::Incremental => {
            let bootstrap = first_crawl_of_day.unwrap_or_else(|| history_is_empty(history));
            let items = if bootstrap {
                Cow::Borrowed(snapshot)
            } else {
                Cow::Owned(new_items_only(snapshot, new_index))
            };
            Scope {
                items,
                all_are_new: true,
                latest_batch: None,
                bootstrap,
            }
        }
    }
}

/// Latest non-empty last-seen time among history entries of the snapshot's sources.
pub fn latest_last_time(snapshot: &Snapshot, history: &History) -> Option<String> {
    snapshot
        .keys()
        .filter_map(|source| history.get(source))
        .flat_map(|titles| titles.values())
        .map(|info| info.last_time.as_str())
        .filter(|t| !t.is_empty())
        .max()
        .map(str::to_string)
}

fn current_batch<'a>(snapshot: &'a Snapshot, history: &History) -> (Cow<'a, Snapshot>, Option<String>) {
    let Some(latest) = latest_last_time(snapshot, history) else {
        // No usable history: fall back to the raw snapshot.
        return (Cow::Borrowed(snapshot), None);
    };

    let mut out: Snapshot = BTreeMap::new();
    for (source, titles) in snapshot {
        let Some(known) = history.get(source) else {
            continue;
        };
        let kept: BTreeMap<_, _> = titles
            .iter()
            .filter(|(title, _)| {
                known
                    .get(title.as_str())
                    .is_some_and(|info| info.last_time == latest)
            })
            .map(|(title, item)| (title.clone(), item.clone()))
            .collect();
        if !kept.is_empty() {
            out.insert(source.clone(), kept);
        }
    }
    (Cow::Owned(out), Some(latest))
}

/// Items named by the new-items index, with snapshot data where present.
fn new_items_only(snapshot: &Snapshot, new_index: &NewItemsIndex) -> Snapshot {
    let mut out: Snapshot = BTreeMap::new();
    for (source, titles) in new_index {
        if titles.is_empty() {
            continue;
        }
        let known = snapshot.get(source);
        let items = titles
            .iter()
            .map(|title| {
                let raw = known
                    .and_then(|t| t.get(title))
                    .cloned()
                    .unwrap_or_default();
                (title.clone(), raw)
            })
            .collect();
        out.insert(source.clone(), items);
    }
    out
}
