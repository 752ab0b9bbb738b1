// src/lib.rs
// Public library surface for integration tests (and the CLI binary).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod metrics;
pub mod regroup;
pub mod scope;
pub mod summary;
pub mod types;

// Rule compiler, matcher and weights
pub mod analyze;

mod debug;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, aggregate_rss, AggregateOptions, RssOptions};
pub use crate::analyze::{build_digest, build_rss_digest, CompiledRules, Digest, Weights};
pub use crate::config::{DigestConfig, DisplayMode};
pub use crate::error::RuleError;
pub use crate::regroup::regroup_by_source;
pub use crate::scope::ReportMode;
pub use crate::types::{
    GroupStat, HistoricalTitleInfo, History, NewItemsIndex, RawItem, RssItem, Snapshot,
    TitleSummary,
};
