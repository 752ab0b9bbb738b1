// tests/invariants.rs
//! Seeded, programmatically built snapshots checked against the engine's
//! invariants across all three report modes.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

use trend_digest::analyze::{compile_rules_str, MatchEngine};
use trend_digest::{
    aggregate, AggregateOptions, CompiledRules, GroupStat, HistoricalTitleInfo, History,
    NewItemsIndex, RawItem, ReportMode, Snapshot,
};

const RULES: &str = r#"
[GLOBAL_FILTER]
spam

[WORD_GROUPS]
/ai|gpt/ => AI
+chip
export
@3
ev => EV
tesla
!rumor
"#;

const WORDS: &[&str] = &[
    "ai", "gpt", "chip", "export", "ev", "tesla", "rumor", "spam", "market", "weather", "sports",
    "Chip", "GPT", "EXPORT",
];
const SOURCES: &[&str] = &["weibo", "zhihu", "baidu", "toutiao"];
const TIMES: &[&str] = &["08-00", "09-30", "11-00", "12-30"];

struct World {
    snapshot: Snapshot,
    history: History,
    new_index: NewItemsIndex,
}

fn random_title(rng: &mut StdRng, n: usize) -> String {
    let len = rng.random_range(1..=4);
    let mut parts: Vec<&str> = (0..len)
        .map(|_| WORDS[rng.random_range(0..WORDS.len())])
        .collect();
    parts.push("#");
    format!("{} {n}", parts.join(" "))
}

fn build_world(seed: u64) -> World {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut snapshot = Snapshot::new();
    let mut history = History::new();
    let mut new_index = NewItemsIndex::new();
    let mut n = 0usize;

    for source in SOURCES {
        let mut titles = BTreeMap::new();
        let mut known = BTreeMap::new();
        let mut fresh = BTreeSet::new();
        for _ in 0..rng.random_range(0..15) {
            n += 1;
            let title = random_title(&mut rng, n);
            let ranks: Vec<u32> = (0..rng.random_range(0..4))
                .map(|_| rng.random_range(1..=30))
                .collect();
            titles.insert(
                title.clone(),
                RawItem {
                    ranks: ranks.clone(),
                    url: format!("https://{source}.example/{n}"),
                    ..Default::default()
                },
            );
            if rng.random_bool(0.8) {
                let first = rng.random_range(0..TIMES.len());
                let last = rng.random_range(first..TIMES.len());
                known.insert(
                    title.clone(),
                    HistoricalTitleInfo {
                        first_time: TIMES[first].into(),
                        last_time: TIMES[last].into(),
                        count: rng.random_range(1..=12),
                        ranks,
                        ..Default::default()
                    },
                );
            }
            if rng.random_bool(0.3) {
                fresh.insert(title);
            }
        }
        snapshot.insert(source.to_string(), titles);
        history.insert(source.to_string(), known);
        new_index.insert(source.to_string(), fresh);
    }

    World {
        snapshot,
        history,
        new_index,
    }
}

fn run(world: &World, rules: &CompiledRules, mode: ReportMode, cap: usize) -> (Vec<GroupStat>, usize) {
    let opts = AggregateOptions {
        mode,
        max_per_group: cap,
        quiet: true,
        first_crawl_of_day: Some(false),
        ..Default::default()
    };
    aggregate(&world.snapshot, rules, &world.history, &world.new_index, &opts)
}

fn rules() -> CompiledRules {
    compile_rules_str(RULES).unwrap()
}

#[test]
fn every_title_lands_in_at_most_one_group() {
    let rules = rules();
    for seed in 0..40 {
        let world = build_world(seed);
        for mode in [ReportMode::Daily, ReportMode::Current, ReportMode::Incremental] {
            let (stats, total) = run(&world, &rules, mode, 0);
            let assigned: usize = stats.iter().map(|s| s.count).sum();
            assert!(assigned <= total, "seed {seed} mode {mode}");

            let mut seen = BTreeSet::new();
            for s in &stats {
                for t in &s.titles {
                    assert!(
                        seen.insert((t.source_id.clone(), t.title.clone())),
                        "seed {seed}: {} emitted twice",
                        t.title
                    );
                }
            }
        }
    }
}

#[test]
fn identical_inputs_give_identical_output() {
    let rules = rules();
    for seed in 0..20 {
        let world = build_world(seed);
        for mode in [ReportMode::Daily, ReportMode::Current, ReportMode::Incremental] {
            assert_eq!(run(&world, &rules, mode, 2), run(&world, &rules, mode, 2));
        }
    }
}

#[test]
fn incremental_emits_only_indexed_titles() {
    let rules = rules();
    for seed in 0..40 {
        let world = build_world(seed);
        let (stats, _) = run(&world, &rules, ReportMode::Incremental, 0);
        for t in stats.iter().flat_map(|s| &s.titles) {
            assert!(world.new_index[&t.source_id].contains(&t.title), "seed {seed}");
            assert!(t.is_new);
        }
    }
}

#[test]
fn current_emits_only_latest_batch() {
    let rules = rules();
    for seed in 0..40 {
        let world = build_world(seed);
        let latest = world
            .snapshot
            .keys()
            .filter_map(|s| world.history.get(s))
            .flat_map(|t| t.values())
            .map(|i| i.last_time.clone())
            .max();
        // No usable history means the snapshot fallback; nothing to check.
        let Some(latest) = latest else {
            continue;
        };
        let (stats, _) = run(&world, &rules, ReportMode::Current, 0);
        for t in stats.iter().flat_map(|s| &s.titles) {
            assert_eq!(t.last_time, latest, "seed {seed}");
        }
    }
}

#[test]
fn excluded_titles_never_appear() {
    let rules = rules();
    for seed in 0..40 {
        let world = build_world(seed);
        let (stats, _) = run(&world, &rules, ReportMode::Daily, 0);
        for t in stats.iter().flat_map(|s| &s.titles) {
            let lower = t.title.to_lowercase();
            assert!(!lower.contains("spam"), "seed {seed}: {}", t.title);
            assert!(!lower.contains("rumor"), "seed {seed}: {}", t.title);
        }
    }
}

#[test]
fn caps_are_respected() {
    let rules = rules();
    for seed in 0..40 {
        let world = build_world(seed);
        for cap in [0usize, 1, 2, 5] {
            let (stats, _) = run(&world, &rules, ReportMode::Daily, cap);
            for s in &stats {
                let group_cap = if s.label == "AI" { 3 } else { cap };
                if group_cap > 0 {
                    assert!(s.titles.len() <= group_cap, "seed {seed} cap {cap} {}", s.label);
                } else {
                    assert_eq!(s.titles.len(), s.count, "seed {seed}");
                }
            }
        }
    }
}

#[test]
fn emitted_titles_agree_with_classifier() {
    let rules = rules();
    let engine = MatchEngine::new(&rules, "unused");
    for seed in 0..20 {
        let world = build_world(seed);
        let (stats, _) = run(&world, &rules, ReportMode::Daily, 0);
        for s in &stats {
            for t in &s.titles {
                let group = engine.classify(&t.title).expect("emitted title must classify");
                assert_eq!(group.label(), s.label);
            }
        }
    }
}
