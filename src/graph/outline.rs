//! Heading-outline graph for visualisation.
//!
//! A lighter alternative to the typed knowledge graph: nodes are headings,
//! list items and paragraph keywords, edges follow the heading hierarchy.
//! Node `category` indexes into `categories`, and `symbolSize` grows with
//! how often a node was seen, which is what chart front ends expect.

use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const MAX_SYMBOL_SIZE: u32 = 60;
const KEYWORD_SIZE: u32 = 15;
const CONCEPT_SIZE: u32 = 20;
const MAX_KEYWORDS_PER_PARAGRAPH: usize = 10;

const STOP_WORDS: &[&str] = &[
    "的", "了", "和", "是", "在", "有", "与", "等", "为", "以", "及", "或", "而", "但", "从",
    "到", "对", "于", "中", "这", "那", "个", "也", "都", "不", "可", "能", "要", "会", "就",
    "说", "我", "你", "他", "她", "它", "们", "我们", "你们", "他们",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Chapter,
    Concept,
    Keyword,
    Heading,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Chapter,
        NodeKind::Concept,
        NodeKind::Keyword,
        NodeKind::Heading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Chapter => "chapter",
            NodeKind::Concept => "concept",
            NodeKind::Keyword => "keyword",
            NodeKind::Heading => "heading",
        }
    }

    /// Position in [`OutlineGraph::categories`].
    pub fn category(&self) -> usize {
        match self {
            NodeKind::Chapter => 0,
            NodeKind::Concept => 1,
            NodeKind::Keyword => 2,
            NodeKind::Heading => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Mentions,
    CoOccurs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Times the node was inserted.
    pub value: u32,
    pub symbol_size: u32,
    pub category: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEdge {
    pub source: String,
    pub target: String,
    pub value: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlineGraph {
    pub nodes: Vec<OutlineNode>,
    pub edges: Vec<OutlineEdge>,
    pub categories: Vec<Category>,
}

/// Basic counts over a Markdown document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub char_count: usize,
    pub heading_count: usize,
    pub paragraph_count: usize,
}

/// Top-level Markdown block with its inline text flattened.
#[derive(Debug, PartialEq)]
enum Block {
    Heading { level: usize, text: String },
    Paragraph(String),
    List(Vec<String>),
    Other,
}

impl Block {
    fn push_text(&mut self, text: &str) {
        match self {
            Block::Heading { text: buf, .. } | Block::Paragraph(buf) => buf.push_str(text),
            Block::List(items) => {
                if let Some(item) = items.last_mut() {
                    item.push_str(text);
                }
            }
            Block::Other => {}
        }
    }
}

fn blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    let mut depth = 0usize;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    current = Some(match tag {
                        Tag::Heading { level, .. } => Block::Heading {
                            level: level as usize,
                            text: String::new(),
                        },
                        Tag::Paragraph => Block::Paragraph(String::new()),
                        Tag::List(_) => Block::List(Vec::new()),
                        _ => Block::Other,
                    });
                } else if depth == 1 && matches!(tag, Tag::Item) {
                    if let Some(Block::List(items)) = current.as_mut() {
                        items.push(String::new());
                    }
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(block) = current.take() {
                        blocks.push(block);
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(block) = current.as_mut() {
                    block.push_text(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(block) = current.as_mut() {
                    block.push_text(" ");
                }
            }
            Event::Rule if depth == 0 => blocks.push(Block::Other),
            _ => {}
        }
    }

    blocks
}

fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '#' | '*' | '_' | '`' | '[' | ']' | '(' | ')'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn keyword_regex() -> &'static Regex {
    static KEYWORD: OnceLock<Regex> = OnceLock::new();
    KEYWORD.get_or_init(|| Regex::new(r"[\x{4e00}-\x{9fa5}]{2,8}").expect("Invalid regex pattern"))
}

/// Up to ten distinct ideographic runs of 2 to 6 characters, stop words removed.
fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    keyword_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|word| (2..=6).contains(&word.chars().count()) && !STOP_WORDS.contains(word))
        .filter(|word| seen.insert(*word))
        .take(MAX_KEYWORDS_PER_PARAGRAPH)
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
struct OutlineBuilder {
    nodes: Vec<OutlineNode>,
    index: HashMap<String, usize>,
    edges: Vec<OutlineEdge>,
    edge_keys: HashSet<(String, String)>,
}

impl OutlineBuilder {
    fn add_node(&mut self, id: &str, name: &str, kind: NodeKind, base_size: u32) {
        if let Some(&i) = self.index.get(id) {
            let node = &mut self.nodes[i];
            node.value += 1;
            node.symbol_size = (base_size + node.value * 2).min(MAX_SYMBOL_SIZE);
            return;
        }

        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(OutlineNode {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            value: 1,
            symbol_size: base_size,
            category: kind.category(),
            description: format!("{}: {}", kind.as_str(), name),
        });
    }

    fn add_edge(&mut self, source: &str, target: &str, kind: EdgeKind) {
        if source == target {
            return;
        }
        if self
            .edge_keys
            .insert((source.to_string(), target.to_string()))
        {
            self.edges.push(OutlineEdge {
                source: source.to_string(),
                target: target.to_string(),
                value: kind,
            });
        }
    }

    fn is_keyword(&self, id: &str) -> bool {
        self.index
            .get(id)
            .is_some_and(|&i| self.nodes[i].kind == NodeKind::Keyword)
    }

    /// Link keywords mentioned under a common heading.
    fn connect_keywords(&mut self) {
        let mut parents: Vec<(String, HashSet<String>)> = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();

        for edge in &self.edges {
            if !self.is_keyword(&edge.target) {
                continue;
            }
            let i = *slot.entry(edge.target.clone()).or_insert_with(|| {
                parents.push((edge.target.clone(), HashSet::new()));
                parents.len() - 1
            });
            parents[i].1.insert(edge.source.clone());
        }

        for i in 0..parents.len() {
            for j in i + 1..parents.len() {
                if !parents[i].1.is_disjoint(&parents[j].1) {
                    let (a, b) = (parents[i].0.clone(), parents[j].0.clone());
                    self.add_edge(&a, &b, EdgeKind::CoOccurs);
                }
            }
        }
    }
}

/// Build the outline graph of a Markdown document.
pub fn build_outline(markdown: &str) -> OutlineGraph {
    let mut builder = OutlineBuilder::default();
    let mut chapter: Option<String> = None;
    let mut section: Option<String> = None;
    let mut last_heading: Option<String> = None;

    for (index, block) in blocks(markdown).into_iter().enumerate() {
        match block {
            Block::Heading { level, text } => {
                let title = clean_text(&text);
                let id = format!("heading_{}_{}", index, title);
                let kind = if level <= 2 {
                    NodeKind::Chapter
                } else {
                    NodeKind::Heading
                };
                builder.add_node(&id, &title, kind, 40u32.saturating_sub(5 * level as u32));

                let parent = match level {
                    1 => None,
                    2 => chapter.as_ref(),
                    3 => section.as_ref(),
                    _ => last_heading.as_ref(),
                };
                if let Some(parent) = parent.cloned() {
                    builder.add_edge(&parent, &id, EdgeKind::Contains);
                }

                match level {
                    1 => {
                        chapter = Some(id.clone());
                        section = None;
                    }
                    2 => section = Some(id.clone()),
                    _ => {}
                }
                last_heading = Some(id);
            }
            Block::Paragraph(text) => {
                for keyword in extract_keywords(&clean_text(&text)) {
                    let id = format!("keyword_{}", keyword);
                    // Keywords keep their first node; repeats only add edges.
                    if !builder.index.contains_key(&id) {
                        builder.add_node(&id, &keyword, NodeKind::Keyword, KEYWORD_SIZE);
                    }
                    if let Some(heading) = &last_heading {
                        builder.add_edge(heading, &id, EdgeKind::Mentions);
                    }
                }
            }
            Block::List(items) => {
                for (item_index, item) in items.iter().enumerate() {
                    let text = clean_text(item);
                    let len = text.chars().count();
                    if len <= 3 || len >= 50 {
                        continue;
                    }
                    let id = format!("concept_{}_{}_{}", index, item_index, text);
                    builder.add_node(&id, &text, NodeKind::Concept, CONCEPT_SIZE);
                    if let Some(heading) = &last_heading {
                        builder.add_edge(heading, &id, EdgeKind::Contains);
                    }
                }
            }
            Block::Other => {}
        }
    }

    builder.connect_keywords();

    log::debug!(
        "Outline graph: {} nodes, {} edges",
        builder.nodes.len(),
        builder.edges.len()
    );

    OutlineGraph {
        nodes: builder.nodes,
        edges: builder.edges,
        categories: NodeKind::ALL
            .iter()
            .map(|k| Category {
                name: k.as_str().to_string(),
            })
            .collect(),
    }
}

pub fn analyze_text(markdown: &str) -> TextStats {
    let blocks = blocks(markdown);
    TextStats {
        char_count: markdown.chars().count(),
        heading_count: blocks
            .iter()
            .filter(|b| matches!(b, Block::Heading { .. }))
            .count(),
        paragraph_count: blocks
            .iter()
            .filter(|b| matches!(b, Block::Paragraph(_)))
            .count(),
    }
}
