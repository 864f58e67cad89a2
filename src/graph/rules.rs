//! Term dictionary and relation-pattern table.
//!
//! Both are plain data so a rule set can be loaded from TOML and swapped
//! without touching the extractors. [`RuleSet::compile`] builds every regex
//! once; the compiled form is shared read-only by all extraction passes.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;

use super::{EntityType, RelationType};
use crate::error::{KgError, Result};

/// One ideographic (CJK Unified) character.
const HAN: &str = r"[\x{4e00}-\x{9fa5}]";

/// Ideographic characters captured on each side of a dictionary term.
const TERM_CONTEXT_CHARS: usize = 10;

/// Clause terminator closing a relation target; end of sentence also counts
/// because segmentation already removed `。！？`.
const CLAUSE_END: &str = r"(?:[。，、；：]|$)";

/// Substrings that mark a term as belonging to a domain category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TermDictionary {
    pub structures: Vec<String>,
    pub phenomena: Vec<String>,
    pub locations: Vec<String>,
    pub ages: Vec<String>,
    pub theories: Vec<String>,
    /// Substrings that mark a heading-like term (chapter, section, part).
    #[serde(default)]
    pub heading_indicators: Vec<String>,
    /// Endings that form a candidate term regardless of the category lists.
    #[serde(default)]
    pub suffixes: Vec<String>,
}

impl TermDictionary {
    /// Categories in classification priority order.
    fn categories(&self) -> [(EntityType, &[String]); 5] {
        [
            (EntityType::GeologicalStructure, &self.structures),
            (EntityType::GeologicalPhenomenon, &self.phenomena),
            (EntityType::Location, &self.locations),
            (EntityType::GeologicalAge, &self.ages),
            (EntityType::Theory, &self.theories),
        ]
    }
}

/// A relation kind and the regex that detects it. The regex must have two
/// capture groups: source phrase, then target phrase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatternRule {
    pub relation: RelationType,
    pub pattern: String,
}

impl PatternRule {
    fn new(relation: RelationType, pattern: impl Into<String>) -> Self {
        Self {
            relation,
            pattern: pattern.into(),
        }
    }
}

/// Dictionary plus pattern table, in uncompiled form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleSet {
    pub dictionary: TermDictionary,
    pub patterns: Vec<PatternRule>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// `<source>KEYWORD<target><clause end>`
fn clause(keyword: &str) -> String {
    format!("(.+?){}(.+?){}", keyword, CLAUSE_END)
}

impl RuleSet {
    /// Built-in rules for geology textbooks.
    pub fn geology() -> Self {
        let dictionary = TermDictionary {
            structures: words(&[
                "区系", "板块", "带", "构造", "褶皱", "断层", "断裂", "隆起", "凹陷", "地台",
                "地槽", "地盾", "造山带", "裂谷", "海沟", "海岭",
            ]),
            phenomena: words(&[
                "运动", "活动", "造山", "岩浆", "火山", "地震", "变质", "沉积", "侵蚀", "风化",
                "剥蚀", "堆积", "抬升", "沉降", "漂移",
            ]),
            locations: words(&[
                "大陆", "海洋", "洋", "海", "陆间带", "陆缘", "盆地", "高原", "山脉", "平原",
                "岛屿", "半岛",
            ]),
            ages: words(&[
                "代", "纪", "世", "期", "古生代", "中生代", "新生代", "元古代", "太古代",
                "寒武纪", "奥陶纪", "志留纪", "泥盆纪", "石炭纪", "二叠纪", "三叠纪", "侏罗纪",
                "白垩纪", "古近纪", "新近纪", "第四纪",
            ]),
            theories: words(&[
                "理论", "学说", "假说", "模型", "方法", "技术", "测量", "分析", "研究", "观测",
                "实验",
            ]),
            heading_indicators: words(&["章", "节", "部分"]),
            suffixes: words(&["区系", "板块", "带", "运动", "构造", "理论", "学说"]),
        };

        use RelationType::*;
        let patterns = vec![
            PatternRule::new(BelongsTo, clause("属于")),
            PatternRule::new(BelongsTo, "(.+?)是(.+?)的一部分"),
            PatternRule::new(BelongsTo, clause("隶属于")),
            PatternRule::new(BelongsTo, clause("归入")),
            PatternRule::new(Causes, clause("导致")),
            PatternRule::new(Causes, clause("引起")),
            PatternRule::new(Causes, clause("造成")),
            PatternRule::new(Causes, clause("促使")),
            PatternRule::new(Forms, clause("形成")),
            PatternRule::new(Forms, clause("产生")),
            PatternRule::new(Forms, clause("生成")),
            PatternRule::new(LocatedIn, clause("位于")),
            PatternRule::new(LocatedIn, clause("处在")),
            PatternRule::new(LocatedIn, clause("分布于")),
            PatternRule::new(LocatedIn, clause("存在于")),
            PatternRule::new(OccursIn, clause("发生于")),
            PatternRule::new(OccursIn, clause("形成于")),
            PatternRule::new(OccursIn, "(.+?)出现在(.+?)时期"),
            PatternRule::new(OccursIn, clause("时代")),
            PatternRule::new(RelatedTo, "(.+?)与(.+?)相关"),
            PatternRule::new(RelatedTo, "(.+?)和(.+?)有关"),
            PatternRule::new(RelatedTo, clause("联系")),
            PatternRule::new(Contains, clause("包含")),
            PatternRule::new(Contains, clause("包括")),
            PatternRule::new(Contains, clause("涵盖")),
        ];

        Self {
            dictionary,
            patterns,
        }
    }

    /// Parse a rule set from TOML text
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| KgError::Rules(e.to_string()))
    }

    /// Load a rule set from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build every regex the extractors need.
    pub fn compile(&self) -> Result<CompiledRules> {
        let dict = &self.dictionary;

        let mut term_regexes = Vec::new();
        for (_, terms) in dict.categories() {
            for term in terms {
                if term.is_empty() {
                    return Err(KgError::Rules("dictionary contains an empty term".to_string()));
                }
                term_regexes.push(Regex::new(&format!(
                    "{han}{{0,{n}}}{term}{han}{{0,{n}}}",
                    han = HAN,
                    n = TERM_CONTEXT_CHARS,
                    term = regex::escape(term)
                ))?);
            }
        }

        let suffix_regexes = dict
            .suffixes
            .iter()
            .map(|suffix| Regex::new(&format!("{}{{2,8}}{}", HAN, regex::escape(suffix))))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut patterns = Vec::with_capacity(self.patterns.len());
        for rule in &self.patterns {
            let regex = Regex::new(&rule.pattern)?;
            // group 0 plus source and target
            if regex.captures_len() < 3 {
                return Err(KgError::Rules(format!(
                    "pattern for {} needs two capture groups: {}",
                    rule.relation, rule.pattern
                )));
            }
            patterns.push((rule.relation, regex));
        }

        Ok(CompiledRules {
            dictionary: dict.clone(),
            term_regexes,
            suffix_regexes,
            patterns,
        })
    }
}

/// A rule set with all regexes built.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    dictionary: TermDictionary,
    term_regexes: Vec<Regex>,
    suffix_regexes: Vec<Regex>,
    patterns: Vec<(RelationType, Regex)>,
}

impl CompiledRules {
    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    pub(crate) fn term_regexes(&self) -> &[Regex] {
        &self.term_regexes
    }

    pub(crate) fn suffix_regexes(&self) -> &[Regex] {
        &self.suffix_regexes
    }

    /// Relation patterns in priority order.
    pub(crate) fn patterns(&self) -> &[(RelationType, Regex)] {
        &self.patterns
    }

    /// First matching category wins; heading indicators come after the
    /// dictionary categories, `concept` is the fallback.
    pub fn classify(&self, term: &str) -> EntityType {
        for (entity_type, terms) in self.dictionary.categories() {
            if terms.iter().any(|t| term.contains(t.as_str())) {
                return entity_type;
            }
        }
        if self
            .dictionary
            .heading_indicators
            .iter()
            .any(|t| term.contains(t.as_str()))
        {
            return EntityType::Chapter;
        }
        EntityType::Concept
    }
}
