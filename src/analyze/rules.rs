//! Rule compiler for the line-oriented keyword language (hot-reloadable
//! from `config/frequency_words.txt`).
//!
//! Grammar, one entry per line (blank lines and `#` comments ignored):
//! - `/regex/` or `/regex/ => Label`: opens a new group, the regex is an OR entry
//! - `word => Label`: opens a new group with `word` as its first OR entry
//! - `word`: OR entry of the active group
//! - `+word`: AND entry of the active group
//! - `!word`: filter word, not bound to any group
//! - `@N`: display cap for the active group
//! - `[GLOBAL_FILTER]` / `[WORD_GROUPS]`: switch sections; every entry under
//!   `[GLOBAL_FILTER]` becomes a global filter
//!
//! A plain or `+` entry with no active group opens an implicit group keyed
//! by that entry. Any malformed line aborts the whole load.

use anyhow::Context;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};
use tracing::{info, warn};

use crate::analyze::matcher::{CompiledRules, WordGroup, WordSpec};
use crate::error::RuleError;

pub const DEFAULT_RULES_PATH: &str = "config/frequency_words.txt";

const SECTION_GLOBAL_FILTER: &str = "GLOBAL_FILTER";
const SECTION_WORD_GROUPS: &str = "WORD_GROUPS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    WordGroups,
    GlobalFilter,
}

/// Compiler state: one group under construction, finalized when the next
/// group opens, the section changes, or input ends.
struct Compiler {
    section: Section,
    current: Option<WordGroup>,
    groups: Vec<WordGroup>,
    keys: HashSet<String>,
    filter_words: Vec<WordSpec>,
    global_filters: Vec<WordSpec>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            section: Section::WordGroups,
            current: None,
            groups: Vec::new(),
            keys: HashSet::new(),
            filter_words: Vec::new(),
            global_filters: Vec::new(),
        }
    }

    fn feed(&mut self, line_no: usize, raw: &str) -> Result<(), RuleError> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            self.section = match name.trim() {
                SECTION_GLOBAL_FILTER => Section::GlobalFilter,
                SECTION_WORD_GROUPS => Section::WordGroups,
                _ => return Err(malformed(line_no, line, "unknown section")),
            };
            self.finish_group();
            return Ok(());
        }

        if self.section == Section::GlobalFilter {
            if line.starts_with('+') || line.starts_with('@') {
                return Err(malformed(
                    line_no,
                    line,
                    "global filters take plain or ! entries only",
                ));
            }
            let body = line.strip_prefix('!').unwrap_or(line);
            let (entry, label) = split_entry(line_no, line, body)?;
            if label.is_some() {
                return Err(malformed(line_no, line, "filters take no display name"));
            }
            self.global_filters.push(entry);
            return Ok(());
        }

        if let Some(body) = line.strip_prefix('!') {
            let (entry, label) = split_entry(line_no, line, body)?;
            if label.is_some() {
                return Err(malformed(line_no, line, "filters take no display name"));
            }
            self.filter_words.push(entry);
            return Ok(());
        }

        if let Some(body) = line.strip_prefix('@') {
            let cap: usize = body
                .trim()
                .parse()
                .map_err(|_| malformed(line_no, line, "cap must be a non-negative integer"))?;
            return match self.current.as_mut() {
                Some(group) => {
                    group.max_count = cap;
                    Ok(())
                }
                None => Err(malformed(line_no, line, "cap outside of a group")),
            };
        }

        if let Some(body) = line.strip_prefix('+') {
            let (entry, label) = split_entry(line_no, line, body)?;
            if label.is_some() || self.current.is_none() {
                let mut group = self.open_group(line_no, &entry, label)?;
                group.required.push(entry);
                self.current = Some(group);
            } else if let Some(group) = self.current.as_mut() {
                group.required.push(entry);
            }
            return Ok(());
        }

        let (entry, label) = split_entry(line_no, line, line)?;
        if entry.is_regex() || label.is_some() || self.current.is_none() {
            let mut group = self.open_group(line_no, &entry, label)?;
            group.normal.push(entry);
            self.current = Some(group);
        } else if let Some(group) = self.current.as_mut() {
            group.normal.push(entry);
        }
        Ok(())
    }

    /// Finalize the active group and start a fresh one keyed by `entry`.
    fn open_group(
        &mut self,
        line_no: usize,
        entry: &WordSpec,
        label: Option<String>,
    ) -> Result<WordGroup, RuleError> {
        self.finish_group();
        let key = entry.source();
        if !self.keys.insert(key.clone()) {
            return Err(RuleError::DuplicateGroup { line: line_no, key });
        }
        let mut group = WordGroup::new(key);
        group.display_name = label;
        Ok(group)
    }

    fn finish_group(&mut self) {
        if let Some(group) = self.current.take() {
            self.groups.push(group);
        }
    }

    fn finish(mut self) -> CompiledRules {
        self.finish_group();
        CompiledRules {
            word_groups: self.groups,
            filter_words: self.filter_words,
            global_filters: self.global_filters,
        }
    }
}

fn malformed(line_no: usize, line: &str, reason: &'static str) -> RuleError {
    RuleError::Malformed {
        line: line_no,
        text: line.to_string(),
        reason,
    }
}

/// Split `body` into its word spec and optional `=> Label`.
/// A `/regex/` head is delimited first, so `=>` inside a pattern is kept.
fn split_entry(
    line_no: usize,
    line: &str,
    body: &str,
) -> Result<(WordSpec, Option<String>), RuleError> {
    let body = body.trim();

    if let Some(rest) = body.strip_prefix('/') {
        let close = rest
            .rfind('/')
            .ok_or_else(|| malformed(line_no, line, "unterminated regex"))?;
        let (pattern, tail) = (&rest[..close], rest[close + 1..].trim());
        let label = if tail.is_empty() {
            None
        } else {
            let label = tail
                .strip_prefix("=>")
                .ok_or_else(|| malformed(line_no, line, "unterminated regex"))?;
            Some(display_name(line_no, line, label)?)
        };
        if pattern.is_empty() {
            return Err(malformed(line_no, line, "empty regex"));
        }
        let spec = WordSpec::regex(pattern).map_err(|e| RuleError::InvalidRegex {
            line: line_no,
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        return Ok((spec, label));
    }

    let (head, label) = match body.rsplit_once("=>") {
        Some((head, label)) => (head.trim(), Some(display_name(line_no, line, label)?)),
        None => (body, None),
    };
    if head.is_empty() {
        return Err(malformed(line_no, line, "empty word"));
    }
    Ok((WordSpec::literal(head), label))
}

fn display_name(line_no: usize, line: &str, raw: &str) -> Result<String, RuleError> {
    let label = raw.trim();
    if label.is_empty() {
        return Err(malformed(line_no, line, "empty display name"));
    }
    Ok(label.to_string())
}

/// Compile an ordered sequence of rule lines.
pub fn compile_rules<I, S>(lines: I) -> Result<CompiledRules, RuleError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut compiler = Compiler::new();
    for (idx, line) in lines.into_iter().enumerate() {
        compiler.feed(idx + 1, line.as_ref())?;
    }
    Ok(compiler.finish())
}

pub fn compile_rules_str(source: &str) -> Result<CompiledRules, RuleError> {
    compile_rules(source.lines())
}

pub fn load_rules_file(path: &Path) -> anyhow::Result<CompiledRules> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading rules from {}", path.display()))?;
    let rules = compile_rules_str(&source)
        .with_context(|| format!("compiling rules from {}", path.display()))?;
    Ok(rules)
}

/// Rule file wrapper that recompiles when the file's mtime changes.
/// A failed reload keeps the last good rule set.
#[derive(Debug)]
pub struct HotReloadRules {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    rules: CompiledRules,
    last_modified: Option<SystemTime>,
}

impl HotReloadRules {
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH));
        Self {
            path,
            inner: RwLock::new(State {
                rules: CompiledRules::default(),
                last_modified: None,
            }),
        }
    }

    pub fn current(&self) -> CompiledRules {
        let needs_reload = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
                guard.last_modified != Some(mtime)
            }
            Err(_) => false,
        };

        if !needs_reload {
            let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
            return guard.rules.clone();
        }

        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Ok(mtime) = fs::metadata(&self.path).and_then(|m| m.modified()) {
            if guard.last_modified != Some(mtime) {
                match load_rules_file(&self.path) {
                    Ok(rules) => {
                        info!(
                            target: "digest",
                            path = %self.path.display(),
                            groups = rules.word_groups.len(),
                            filters = rules.filter_words.len(),
                            global_filters = rules.global_filters.len(),
                            "rules reloaded"
                        );
                        guard.rules = rules;
                    }
                    Err(e) => {
                        warn!(target: "digest", error = %format!("{e:#}"), "rules reload failed; keeping previous set");
                    }
                }
                guard.last_modified = Some(mtime);
            }
        }
        guard.rules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::{thread, time::Duration};

    #[test]
    fn regex_group_with_label_and_filter() {
        let rules = compile_rules_str(
            "# topics\n/AI|artificial intelligence/ => AI新闻\n\n!广告\n",
        )
        .unwrap();
        assert_eq!(rules.word_groups.len(), 1);
        let g = &rules.word_groups[0];
        assert_eq!(g.group_key, "/AI|artificial intelligence/");
        assert_eq!(g.label(), "AI新闻");
        assert_eq!(g.normal.len(), 1);
        assert_eq!(rules.filter_words.len(), 1);
        assert!(rules.global_filters.is_empty());
    }

    #[test]
    fn active_group_carries_over_until_next_category() {
        let rules = compile_rules_str(
            "/chip/ => Chips\n+export\nnvidia\n@5\n/ev/ => EV\ntesla\n",
        )
        .unwrap();
        assert_eq!(rules.word_groups.len(), 2);
        let chips = &rules.word_groups[0];
        assert_eq!(chips.required.len(), 1);
        assert_eq!(chips.normal.len(), 2);
        assert_eq!(chips.max_count, 5);
        let ev = &rules.word_groups[1];
        assert_eq!(ev.normal.len(), 2);
        assert_eq!(ev.max_count, 0);
    }

    #[test]
    fn plain_words_open_implicit_group() {
        let rules = compile_rules_str("华为\n+手机\nmate => 华为新机\n").unwrap();
        assert_eq!(rules.word_groups.len(), 2);
        assert_eq!(rules.word_groups[0].group_key, "华为");
        assert_eq!(rules.word_groups[0].required.len(), 1);
        assert_eq!(rules.word_groups[1].label(), "华为新机");
    }

    #[test]
    fn global_filter_section() {
        let rules = compile_rules_str("[GLOBAL_FILTER]\n!赌博\n彩票\n[WORD_GROUPS]\nai\n").unwrap();
        assert_eq!(rules.global_filters.len(), 2);
        assert_eq!(rules.word_groups.len(), 1);
        assert!(rules.filter_words.is_empty());
    }

    #[test]
    fn bad_regex_aborts_whole_load() {
        let err = compile_rules_str("ai\n/(unclosed/\nrobot\n").unwrap_err();
        assert!(matches!(err, RuleError::InvalidRegex { line: 2, .. }));
    }

    #[test]
    fn malformed_lines_abort_with_line_number() {
        for (src, line) in [
            ("ai\n+\n", 2),
            ("!\n", 1),
            ("/open-ended\n", 1),
            ("ai =>\n", 1),
            ("@3\n", 1),
            ("ai\n@many\n", 2),
            ("[UNKNOWN]\n", 1),
            ("!ads => Ads\n", 1),
            ("/ai/ trailing\n", 1),
            ("[GLOBAL_FILTER]\n+赌博\n", 2),
            ("[GLOBAL_FILTER]\n@5\n", 2),
        ] {
            let err = compile_rules_str(src).unwrap_err();
            assert_eq!(err.line(), line, "source {src:?}");
            assert!(matches!(err, RuleError::Malformed { .. }), "source {src:?}");
        }
    }

    #[test]
    fn arrow_inside_regex_is_part_of_the_pattern() {
        let rules = compile_rules_str("/a=>b/\n/x=>y/ => Arrows\n").unwrap();
        assert_eq!(rules.word_groups.len(), 2);
        assert_eq!(rules.word_groups[0].group_key, "/a=>b/");
        assert_eq!(rules.word_groups[0].label(), "/a=>b/");
        assert_eq!(rules.word_groups[1].group_key, "/x=>y/");
        assert_eq!(rules.word_groups[1].label(), "Arrows");
        assert!(rules.word_groups[0].is_satisfied_by("a=>b"));
    }

    #[test]
    fn duplicate_group_key_rejected() {
        let err = compile_rules_str("/ai/\n/ai/ => again\n").unwrap_err();
        assert_eq!(
            err,
            RuleError::DuplicateGroup {
                line: 2,
                key: "/ai/".into()
            }
        );
    }

    #[test]
    fn empty_source_compiles_to_empty_rules() {
        let rules = compile_rules_str("# nothing here\n\n").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn hot_reload_keeps_last_good_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frequency_words.txt");
        {
            let mut f = fs::File::create(&path).unwrap();
            writeln!(f, "/ai/ => AI").unwrap();
            f.sync_all().unwrap();
        }

        let hot = HotReloadRules::new(Some(&path));
        let first = hot.current();
        assert_eq!(first.word_groups.len(), 1);
        assert_eq!(first.word_groups[0].label(), "AI");

        // Ensure different mtime (coarse filesystem granularity).
        thread::sleep(Duration::from_millis(1100));
        {
            let mut f = fs::File::create(&path).unwrap();
            writeln!(f, "/(broken/").unwrap();
            f.sync_all().unwrap();
        }
        let after_bad = hot.current();
        assert_eq!(after_bad.word_groups.len(), 1);
        assert_eq!(after_bad.word_groups[0].label(), "AI");

        thread::sleep(Duration::from_millis(1100));
        {
            let mut f = fs::File::create(&path).unwrap();
            writeln!(f, "/ai/ => AI\n/ev/ => EV").unwrap();
            f.sync_all().unwrap();
        }
        assert_eq!(hot.current().word_groups.len(), 2);
    }

    #[test]
    fn missing_file_yields_empty_rules() {
        let hot = HotReloadRules::new(Some(Path::new("/definitely/not/here.txt")));
        assert!(hot.current().is_empty());
    }
}
