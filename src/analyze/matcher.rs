//! Title matcher: compiled word specs, word groups and the single
//! `classify` decision that both includes a title and picks its bucket.
//!
//! Matching is case-insensitive: literals are lower-cased once at compile
//! time and compared against the lower-cased title; regexes are compiled
//! case-insensitively and searched in the lower-cased title. Pattern text
//! itself is never rewritten, so a pattern that re-enables case sensitivity
//! inline (`(?-i)`) only matches lower-case text.

use regex::{Regex, RegexBuilder};

/// One entry of the rule language: a literal or a `/regex/`.
#[derive(Debug, Clone)]
pub enum WordSpec {
    Literal { text: String, lowered: String },
    Regex { pattern: String, re: Regex },
}

impl WordSpec {
    pub fn literal(text: &str) -> Self {
        WordSpec::Literal {
            text: text.to_string(),
            lowered: text.to_lowercase(),
        }
    }

    /// Compile `pattern` (without the surrounding slashes).
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(WordSpec::Regex {
            pattern: pattern.to_string(),
            re,
        })
    }

    /// `title_lower` must already be lower-cased.
    pub fn matches(&self, title_lower: &str) -> bool {
        match self {
            WordSpec::Literal { lowered, .. } => title_lower.contains(lowered.as_str()),
            WordSpec::Regex { re, .. } => re.is_match(title_lower),
        }
    }

    /// Source text as written in the rules (`/…/` for regexes).
    pub fn source(&self) -> String {
        match self {
            WordSpec::Literal { text, .. } => text.clone(),
            WordSpec::Regex { pattern, .. } => format!("/{pattern}/"),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, WordSpec::Regex { .. })
    }
}

/// A classification bucket. Declaration order fixes priority.
#[derive(Debug, Clone)]
pub struct WordGroup {
    /// AND: every entry must match.
    pub required: Vec<WordSpec>,
    /// OR: at least one must match; an empty list places no constraint.
    pub normal: Vec<WordSpec>,
    pub group_key: String,
    pub display_name: Option<String>,
    /// 0 = fall back to the pipeline default cap.
    pub max_count: usize,
}

impl WordGroup {
    pub fn new(group_key: impl Into<String>) -> Self {
        Self {
            required: Vec::new(),
            normal: Vec::new(),
            group_key: group_key.into(),
            display_name: None,
            max_count: 0,
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.group_key)
    }

    /// Every required entry and at least one normal entry (when any) must
    /// match. A group with neither required nor normal entries never matches.
    pub fn is_satisfied_by(&self, title_lower: &str) -> bool {
        if self.required.is_empty() && self.normal.is_empty() {
            return false;
        }
        self.required.iter().all(|w| w.matches(title_lower))
            && (self.normal.is_empty() || self.normal.iter().any(|w| w.matches(title_lower)))
    }
}

/// Output of the rule compiler.
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    pub word_groups: Vec<WordGroup>,
    pub filter_words: Vec<WordSpec>,
    pub global_filters: Vec<WordSpec>,
}

impl CompiledRules {
    /// No word groups: downstream degenerates to a catch-all group.
    pub fn is_empty(&self) -> bool {
        self.word_groups.is_empty()
    }
}

/// Per-run matcher built from compiled rules.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    groups: Vec<WordGroup>,
    filter_words: Vec<WordSpec>,
    global_filters: Vec<WordSpec>,
    catch_all: bool,
}

impl MatchEngine {
    /// With no word groups the engine holds one synthetic group named
    /// `catch_all_key` that accepts everything; per-group filter words are
    /// dropped but global filters still apply.
    pub fn new(rules: &CompiledRules, catch_all_key: &str) -> Self {
        if rules.is_empty() {
            return Self {
                groups: vec![WordGroup::new(catch_all_key)],
                filter_words: Vec::new(),
                global_filters: rules.global_filters.clone(),
                catch_all: true,
            };
        }
        Self {
            groups: rules.word_groups.clone(),
            filter_words: rules.filter_words.clone(),
            global_filters: rules.global_filters.clone(),
            catch_all: false,
        }
    }

    pub fn groups(&self) -> &[WordGroup] {
        &self.groups
    }

    pub fn is_catch_all(&self) -> bool {
        self.catch_all
    }

    /// Index of the first group the title belongs to, or `None` when it is
    /// filtered out or matches nothing. Filters always win.
    pub fn classify_index(&self, title: &str) -> Option<usize> {
        let lower = title.to_lowercase();
        if self
            .global_filters
            .iter()
            .chain(self.filter_words.iter())
            .any(|f| f.matches(&lower))
        {
            return None;
        }
        if self.catch_all {
            return Some(0);
        }
        self.groups.iter().position(|g| g.is_satisfied_by(&lower))
    }

    pub fn classify(&self, title: &str) -> Option<&WordGroup> {
        self.classify_index(title).map(|i| &self.groups[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: &str, required: &[&str], normal: &[&str]) -> WordGroup {
        let mut g = WordGroup::new(key);
        g.required = required.iter().map(|w| WordSpec::literal(w)).collect();
        g.normal = normal.iter().map(|w| WordSpec::literal(w)).collect();
        g
    }

    #[test]
    fn literal_is_case_insensitive_substring() {
        let w = WordSpec::literal("OpenAI");
        assert!(w.matches(&"Breaking: OPENAI ships".to_lowercase()));
        assert!(!w.matches("open ai"));
    }

    #[test]
    fn regex_matches_lowercased_title() {
        let w = WordSpec::regex("AI|artificial intelligence").unwrap();
        assert!(w.matches(&"AI芯片突破".to_lowercase()));
        assert_eq!(w.source(), "/AI|artificial intelligence/");
    }

    #[test]
    fn inline_case_sensitive_regex_needs_lowercase_pattern() {
        let upper = WordSpec::regex("(?-i)GPU").unwrap();
        let lower = WordSpec::regex("(?-i)gpu").unwrap();
        let title = "New GPU launch".to_lowercase();
        assert!(!upper.matches(&title));
        assert!(lower.matches(&title));
    }

    #[test]
    fn required_and_normal_must_both_hold() {
        let g = group("chips", &["chip", "export"], &["nvidia", "amd"]);
        assert!(g.is_satisfied_by("nvidia chip export ban"));
        assert!(!g.is_satisfied_by("chip export ban"));
        assert!(!g.is_satisfied_by("nvidia chip earnings"));
        assert!(!g.is_satisfied_by("nvidia earnings"));
    }

    #[test]
    fn required_only_group_needs_every_entry() {
        let g = group("chips", &["chip", "export"], &[]);
        assert!(g.is_satisfied_by("chip export ban"));
        assert!(!g.is_satisfied_by("chip shortage"));
    }

    #[test]
    fn regex_opened_group_keeps_its_pattern_with_required_word() {
        let mut g = WordGroup::new("/ai|gpt/");
        g.normal = vec![WordSpec::regex("ai|gpt").unwrap()];
        g.required = vec![WordSpec::literal("模型")];
        assert!(g.is_satisfied_by(&"GPT大模型发布".to_lowercase()));
        assert!(!g.is_satisfied_by("汽车模型展览"));
    }

    #[test]
    fn empty_group_never_matches() {
        assert!(!group("void", &[], &[]).is_satisfied_by("anything"));
    }

    #[test]
    fn first_declared_group_wins() {
        let rules = CompiledRules {
            word_groups: vec![group("a", &[], &["apple"]), group("b", &[], &["apple", "pie"])],
            ..Default::default()
        };
        let engine = MatchEngine::new(&rules, "all");
        assert_eq!(engine.classify_index("Apple pie recipe"), Some(0));
        assert_eq!(engine.classify_index("Cherry pie"), Some(1));
        assert_eq!(engine.classify_index("Banana"), None);
    }

    #[test]
    fn filters_win_over_groups() {
        let rules = CompiledRules {
            word_groups: vec![group("ai", &[], &["ai"])],
            filter_words: vec![WordSpec::literal("广告")],
            global_filters: vec![WordSpec::literal("spam")],
        };
        let engine = MatchEngine::new(&rules, "all");
        assert!(engine.classify("广告推广AI新品").is_none());
        assert!(engine.classify("AI spam digest").is_none());
        assert_eq!(engine.classify("AI news").map(|g| g.label()), Some("ai"));
    }

    #[test]
    fn catch_all_keeps_only_global_filters() {
        let rules = CompiledRules {
            word_groups: Vec::new(),
            filter_words: vec![WordSpec::literal("ads")],
            global_filters: vec![WordSpec::literal("spam")],
        };
        let engine = MatchEngine::new(&rules, "all");
        assert!(engine.is_catch_all());
        assert_eq!(engine.classify_index("ads everywhere"), Some(0));
        assert_eq!(engine.classify_index("spam everywhere"), None);
    }
}
